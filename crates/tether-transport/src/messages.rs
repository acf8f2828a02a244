//! CBOR records exchanged during the handshake.
//!
//! Every handshake frame carries one [`HandshakeMessage`] with exactly one of
//! its three parts set. Byte fields are `Vec<u8>` rather than fixed arrays so
//! that a wrong-length value from the peer surfaces as a validation error in
//! the handshake driver instead of a decode failure.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{cbor, Result};

/// Outer handshake record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeMessage {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_hello: Option<ClientHello>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub server_hello: Option<ServerHello>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_finish: Option<ClientFinish>,
}

/// Message 1: the client's ephemeral public key in the clear.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHello {
    #[serde_as(as = "serde_with::Bytes")]
    pub ephemeral: Vec<u8>,
}

/// Message 2: server ephemeral, encrypted server static, encrypted certificate.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHello {
    #[serde_as(as = "serde_with::Bytes")]
    pub ephemeral: Vec<u8>,
    #[serde_as(as = "Option<serde_with::Bytes>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_ciphertext: Option<Vec<u8>>,
    #[serde_as(as = "Option<serde_with::Bytes>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

/// Message 3: encrypted client static and encrypted client payload.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFinish {
    #[serde_as(as = "serde_with::Bytes")]
    pub static_ciphertext: Vec<u8>,
    #[serde_as(as = "serde_with::Bytes")]
    pub payload: Vec<u8>,
}

/// Certificate envelope carried (encrypted) in message 2.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseCertificate {
    /// CBOR-encoded [`NoiseCertificateDetails`].
    #[serde_as(as = "Option<serde_with::Bytes>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<u8>>,
    /// Issuer signature over `details`.
    #[serde_as(as = "Option<serde_with::Bytes>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

/// Signed body of a [`NoiseCertificate`].
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseCertificateDetails {
    pub serial: u32,
    pub issuer: String,
    /// Unix seconds.
    pub expires: u64,
    pub subject: String,
    /// The server static key this certificate vouches for.
    #[serde_as(as = "serde_with::Bytes")]
    pub key: Vec<u8>,
}

impl HandshakeMessage {
    pub fn client_hello(ephemeral: &[u8]) -> Self {
        Self {
            client_hello: Some(ClientHello {
                ephemeral: ephemeral.to_vec(),
            }),
            ..Self::default()
        }
    }

    pub fn server_hello(hello: ServerHello) -> Self {
        Self {
            server_hello: Some(hello),
            ..Self::default()
        }
    }

    pub fn client_finish(static_ciphertext: Vec<u8>, payload: Vec<u8>) -> Self {
        Self {
            client_finish: Some(ClientFinish {
                static_ciphertext,
                payload,
            }),
            ..Self::default()
        }
    }

    /// Serialize to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec(self)
    }

    /// Deserialize from CBOR.
    pub fn decode(data: &[u8]) -> Result<Self> {
        cbor::from_slice(data)
    }
}

impl NoiseCertificate {
    /// Build an envelope around encoded details.
    pub fn new(details: &NoiseCertificateDetails, signature: Vec<u8>) -> Result<Self> {
        Ok(Self {
            details: Some(cbor::to_vec(details)?),
            signature: Some(signature),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::to_vec(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        cbor::from_slice(data)
    }
}

impl NoiseCertificateDetails {
    pub fn decode(data: &[u8]) -> Result<Self> {
        cbor::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_one_part_is_encoded() {
        let msg = HandshakeMessage::client_hello(&[7u8; 32]);
        let decoded = HandshakeMessage::decode(&msg.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, msg);
        assert!(decoded.server_hello.is_none());
        assert!(decoded.client_finish.is_none());
    }

    #[test]
    fn test_server_hello_missing_parts_decode_as_none() {
        let hello = ServerHello {
            ephemeral: vec![1u8; 32],
            static_ciphertext: None,
            payload: Some(vec![9, 9]),
        };
        let bytes = HandshakeMessage::server_hello(hello).encode().expect("encode");
        let decoded = HandshakeMessage::decode(&bytes).expect("decode");
        let hello = decoded.server_hello.expect("server hello");
        assert!(hello.static_ciphertext.is_none());
        assert_eq!(hello.payload.as_deref(), Some([9u8, 9].as_slice()));
    }

    #[test]
    fn test_certificate_details_nested() {
        let details = NoiseCertificateDetails {
            serial: 7,
            issuer: "WhatsAppLongTerm1".into(),
            expires: 1_900_000_000,
            subject: "server".into(),
            key: vec![0xAA; 32],
        };
        let cert = NoiseCertificate::new(&details, vec![0x55; 64]).expect("cert");
        let decoded = NoiseCertificate::decode(&cert.encode().expect("encode")).expect("decode");
        let inner = NoiseCertificateDetails::decode(decoded.details.as_deref().expect("details"))
            .expect("details decode");
        assert_eq!(inner, details);
    }
}
