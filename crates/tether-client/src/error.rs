//! Client error types.

use tether_crypto::CryptoError;
use tether_store::StoreError;
use tether_transport::TransportError;

use crate::config::ConfigError;

/// Failures specific to one handshake attempt. None of them is retried.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("malformed handshake response: {0}")]
    MalformedResponse(&'static str),

    #[error("failed to decrypt {stage}")]
    Decrypt {
        stage: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("failed to mix {stage} into the chaining key")]
    KeyAgreement {
        stage: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("unexpected length of server static key: {0} (expected 32)")]
    InvalidStaticLength(usize),

    #[error("failed to parse noise certificate")]
    CertificateParse(#[source] TransportError),

    #[error("certificate key does not match the server static key")]
    CertificateMismatch,

    #[error("certificate signature is invalid")]
    CertificateSignature(#[source] CryptoError),
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O or framing; the connection is gone, reconnecting may help.
    Transport,
    /// The attempt failed authentication or validation.
    Handshake,
    /// The backing store failed.
    Store,
    /// The schema could not be brought up to date; do not continue.
    Migration,
    /// Bad configuration.
    Config,
}

/// Top-level client error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Handshake(_) => ErrorKind::Handshake,
            Self::Store(StoreError::Migration(_) | StoreError::MigrationStep { .. }) => {
                ErrorKind::Migration
            }
            Self::Store(_) => ErrorKind::Store,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::from(TransportError::Closed).kind(), ErrorKind::Transport);
        assert_eq!(
            Error::from(HandshakeError::CertificateMismatch).kind(),
            ErrorKind::Handshake
        );
        assert_eq!(
            Error::from(StoreError::Migration("newer".into())).kind(),
            ErrorKind::Migration
        );
        assert_eq!(Error::from(StoreError::MissingAddress).kind(), ErrorKind::Store);
    }

    #[test]
    fn test_cause_chain_is_inspectable() {
        let err = Error::from(HandshakeError::Decrypt {
            stage: "server static",
            source: TransportError::Crypto(CryptoError::AeadDecryption),
        });
        let handshake = err.source().expect("handshake cause");
        let transport = handshake.source().expect("transport cause");
        assert!(transport.source().is_some());
        assert!(matches!(
            err,
            Error::Handshake(HandshakeError::Decrypt {
                stage: "server static",
                ..
            })
        ));
    }
}
