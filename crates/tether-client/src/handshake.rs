//! Client side of the Noise XX handshake.
//!
//! ```text
//! -> e
//! <- e, ee, s, es        (plus the server certificate)
//! -> s, se               (plus the client payload)
//! ```
//!
//! One call is one attempt. Any failure consumes the frame socket; the caller
//! reconnects and retries with a fresh ephemeral key. Device key material is
//! only generated once the server certificate has been accepted.

use std::time::Duration;

use subtle::ConstantTimeEq;
use tether_crypto::keys::KeyPair;
use tether_store::{Device, StoreError};
use tether_transport::frame::{CONN_HEADER, FRAME_MAX_SIZE};
use tether_transport::messages::{HandshakeMessage, NoiseCertificate, NoiseCertificateDetails};
use tether_transport::noise::NOISE_START_PATTERN;
use tether_transport::{FrameSocket, NoiseHandshake, NoiseSocket, TransportKeys};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::error::HandshakeError;
use crate::payload::ClientPayload;
use crate::Result;

/// Runtime handshake settings.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Deadline for the server hello.
    pub timeout: Duration,
    /// Trusted Ed25519 key of the certificate issuer, if signatures are checked.
    pub issuer_key: Option<[u8; 32]>,
    /// Connection header and prologue.
    pub header: Vec<u8>,
    pub max_frame_size: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            issuer_key: None,
            header: CONN_HEADER.to_vec(),
            max_frame_size: FRAME_MAX_SIZE,
        }
    }
}

/// A completed handshake: the plaintext frame socket and the derived keys.
pub struct HandshakeOutcome<S> {
    pub frames: FrameSocket<S>,
    pub keys: TransportKeys,
    /// Long-term key of the server, as certified.
    pub server_static: [u8; 32],
    pub certificate: NoiseCertificateDetails,
}

impl<S> HandshakeOutcome<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Switch the connection to encrypted mode.
    pub fn into_socket(self) -> NoiseSocket<S> {
        NoiseSocket::new(self.frames, &self.keys)
    }
}

/// Run the client handshake over `frames`, which must be freshly connected.
///
/// `ephemeral` must never be reused across attempts.
pub async fn do_handshake<S>(
    mut frames: FrameSocket<S>,
    device: &mut Device,
    ephemeral: KeyPair,
    config: &HandshakeConfig,
) -> Result<HandshakeOutcome<S>>
where
    S: AsyncRead + AsyncWrite,
{
    let mut state = NoiseHandshake::start(NOISE_START_PATTERN, frames.header());
    state.authenticate(ephemeral.public());

    let hello = HandshakeMessage::client_hello(ephemeral.public()).encode()?;
    debug!(len = hello.len(), "sending client hello");
    let response = frames.send_and_receive(&hello, config.timeout).await?;
    debug!(len = response.len(), "received server hello");

    let server_hello = HandshakeMessage::decode(&response)
        .map_err(|_| HandshakeError::MalformedResponse("not a handshake message"))?
        .server_hello
        .ok_or(HandshakeError::MalformedResponse("missing server hello"))?;
    let server_ephemeral = <[u8; 32]>::try_from(server_hello.ephemeral.as_slice())
        .map_err(|_| HandshakeError::MalformedResponse("server ephemeral is not 32 bytes"))?;
    let static_ciphertext = server_hello
        .static_ciphertext
        .ok_or(HandshakeError::MalformedResponse("missing server static"))?;
    let certificate_ciphertext = server_hello
        .payload
        .ok_or(HandshakeError::MalformedResponse("missing certificate"))?;

    state.authenticate(&server_ephemeral);
    state
        .mix_shared_secret(&ephemeral, &server_ephemeral)
        .map_err(|source| HandshakeError::KeyAgreement {
            stage: "server ephemeral",
            source,
        })?;

    let decrypted_static = state
        .decrypt(&static_ciphertext)
        .map_err(|source| HandshakeError::Decrypt {
            stage: "server static",
            source,
        })?;
    let server_static = <[u8; 32]>::try_from(decrypted_static.as_slice())
        .map_err(|_| HandshakeError::InvalidStaticLength(decrypted_static.len()))?;
    debug!("decrypted server static key");

    state
        .mix_shared_secret(&ephemeral, &server_static)
        .map_err(|source| HandshakeError::KeyAgreement {
            stage: "server static",
            source,
        })?;

    let certificate_plaintext = state
        .decrypt(&certificate_ciphertext)
        .map_err(|source| HandshakeError::Decrypt {
            stage: "certificate",
            source,
        })?;
    let certificate =
        verify_certificate(&certificate_plaintext, &server_static, config.issuer_key.as_ref())?;
    debug!(
        serial = certificate.serial,
        issuer = %certificate.issuer,
        "server certificate accepted"
    );

    if device.materialize_identity()? {
        info!("generated device key material");
    }
    let noise_key = device
        .noise_key
        .as_ref()
        .ok_or(StoreError::Incomplete("noise key"))?;
    let payload = ClientPayload::for_device(device)?.encode()?;

    let static_ciphertext = state.encrypt(noise_key.public())?;
    state
        .mix_shared_secret(noise_key, &server_ephemeral)
        .map_err(|source| HandshakeError::KeyAgreement {
            stage: "client static",
            source,
        })?;
    let payload_ciphertext = state.encrypt(&payload)?;

    let finish = HandshakeMessage::client_finish(static_ciphertext, payload_ciphertext).encode()?;
    debug!(len = finish.len(), "sending client finish");
    frames.send_frame(&finish).await?;

    let keys = state.finish()?;
    info!(server = %hex::encode(server_static), "noise handshake complete");

    Ok(HandshakeOutcome {
        frames,
        keys,
        server_static,
        certificate,
    })
}

/// Parse the decrypted certificate and check it vouches for `server_static`.
pub fn verify_certificate(
    plaintext: &[u8],
    server_static: &[u8; 32],
    issuer_key: Option<&[u8; 32]>,
) -> std::result::Result<NoiseCertificateDetails, HandshakeError> {
    let envelope = NoiseCertificate::decode(plaintext).map_err(HandshakeError::CertificateParse)?;
    let (Some(raw_details), Some(signature)) = (envelope.details, envelope.signature) else {
        return Err(HandshakeError::MalformedResponse(
            "certificate is missing details or signature",
        ));
    };
    let details =
        NoiseCertificateDetails::decode(&raw_details).map_err(HandshakeError::CertificateParse)?;

    if let Some(issuer) = issuer_key {
        tether_crypto::ed25519::verify(issuer, &raw_details, &signature)
            .map_err(HandshakeError::CertificateSignature)?;
    }

    if !bool::from(details.key.as_slice().ct_eq(server_static.as_slice())) {
        warn!(
            certified = %hex::encode(&details.key),
            presented = %hex::encode(server_static),
            "certificate key does not match server static key"
        );
        return Err(HandshakeError::CertificateMismatch);
    }

    Ok(details)
}
