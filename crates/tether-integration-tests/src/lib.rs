//! Integration test crate for the tether secure channel.
//!
//! The library part is a simulated server: the responder side of the Noise XX
//! handshake, written directly against `tether-transport`. The tests under
//! `tests/` run the real client against it over `tokio::io::duplex`.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p tether-integration-tests
//! ```

use ed25519_dalek::{Signer, SigningKey};
use tether_client::ClientPayload;
use tether_crypto::keys::KeyPair;
use tether_transport::frame::CONN_HEADER;
use tether_transport::messages::{
    HandshakeMessage, NoiseCertificate, NoiseCertificateDetails, ServerHello,
};
use tether_transport::noise::NOISE_START_PATTERN;
use tether_transport::{cbor, FrameSocket, NoiseHandshake, Result, TransportError, TransportKeys};
use tokio::io::DuplexStream;

/// Key whose private half is the bytes `start..start+32`.
pub fn key_from_range(start: u8) -> KeyPair {
    let mut private = [0u8; 32];
    for (i, b) in private.iter_mut().enumerate() {
        *b = start + i as u8;
    }
    KeyPair::from_private(private)
}

/// Responder side of the handshake with configurable misbehavior.
pub struct SimulatedServer {
    ephemeral: KeyPair,
    static_key: KeyPair,
    issuer: SigningKey,
    certified_key: Option<[u8; 32]>,
    flip_static_byte: Option<usize>,
}

/// What the server learned from a completed handshake.
pub struct ServerSession {
    pub frames: FrameSocket<DuplexStream>,
    /// Already swapped to the responder's direction.
    pub keys: TransportKeys,
    pub client_static: [u8; 32],
    pub payload: ClientPayload,
}

impl SimulatedServer {
    pub fn new(ephemeral: KeyPair, static_key: KeyPair) -> Self {
        Self {
            ephemeral,
            static_key,
            issuer: SigningKey::from_bytes(&[0x5a; 32]),
            certified_key: None,
            flip_static_byte: None,
        }
    }

    /// Server with random keys.
    pub fn random() -> Self {
        Self::new(KeyPair::generate(), KeyPair::generate())
    }

    /// Issue the certificate for `key` instead of the real static key.
    pub fn certify(mut self, key: [u8; 32]) -> Self {
        self.certified_key = Some(key);
        self
    }

    /// Corrupt one byte of the encrypted static key.
    pub fn flip_static_ciphertext(mut self, index: usize) -> Self {
        self.flip_static_byte = Some(index);
        self
    }

    pub fn with_issuer(mut self, issuer: SigningKey) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn issuer_public(&self) -> [u8; 32] {
        self.issuer.verifying_key().to_bytes()
    }

    pub fn static_public(&self) -> [u8; 32] {
        *self.static_key.public()
    }

    /// Run the responder handshake over `stream`.
    pub async fn accept(self, stream: DuplexStream) -> Result<ServerSession> {
        let mut frames = FrameSocket::new(stream, &[]);
        frames.read_header(&CONN_HEADER).await?;
        let mut state = NoiseHandshake::start(NOISE_START_PATTERN, &CONN_HEADER);

        let hello = HandshakeMessage::decode(&frames.receive_frame().await?)?
            .client_hello
            .ok_or_else(|| TransportError::ProtocolViolation("expected client hello".into()))?;
        let client_ephemeral = to_key(&hello.ephemeral)?;
        state.authenticate(&client_ephemeral);

        state.authenticate(self.ephemeral.public());
        state.mix_shared_secret(&self.ephemeral, &client_ephemeral)?;
        let mut static_ciphertext = state.encrypt(self.static_key.public())?;
        if let Some(index) = self.flip_static_byte {
            static_ciphertext[index] ^= 0x01;
        }
        state.mix_shared_secret(&self.static_key, &client_ephemeral)?;

        let details = NoiseCertificateDetails {
            serial: 1,
            issuer: "simulated-root".into(),
            expires: 4_102_444_800,
            subject: "simulated-server".into(),
            key: self
                .certified_key
                .unwrap_or(*self.static_key.public())
                .to_vec(),
        };
        let raw_details = cbor::to_vec(&details)?;
        let signature = self.issuer.sign(&raw_details).to_bytes().to_vec();
        let certificate = NoiseCertificate {
            details: Some(raw_details),
            signature: Some(signature),
        }
        .encode()?;
        let certificate_ciphertext = state.encrypt(&certificate)?;

        let reply = HandshakeMessage::server_hello(ServerHello {
            ephemeral: self.ephemeral.public().to_vec(),
            static_ciphertext: Some(static_ciphertext),
            payload: Some(certificate_ciphertext),
        });
        frames.send_frame(&reply.encode()?).await?;

        let finish = HandshakeMessage::decode(&frames.receive_frame().await?)?
            .client_finish
            .ok_or_else(|| TransportError::ProtocolViolation("expected client finish".into()))?;
        let client_static = to_key(&state.decrypt(&finish.static_ciphertext)?)?;
        state.mix_shared_secret(&self.ephemeral, &client_static)?;
        let payload: ClientPayload = cbor::from_slice(&state.decrypt(&finish.payload)?)?;

        Ok(ServerSession {
            frames,
            keys: state.finish()?.swapped(),
            client_static,
            payload,
        })
    }
}

fn to_key(bytes: &[u8]) -> Result<[u8; 32]> {
    <[u8; 32]>::try_from(bytes)
        .map_err(|_| TransportError::ProtocolViolation(format!("key of {} bytes", bytes.len())))
}
