//! # tether-transport
//!
//! Secure-channel transport for the multi-device client.
//!
//! ## Architecture
//!
//! ```text
//! Upper layers (out of scope)
//!     |
//!     v
//! NoiseSocket (socket.rs)     -- AEAD-sealed frames, reader task + serialized writer
//!     ^
//!     |  finish()
//! NoiseHandshake (noise.rs)   -- transcript hash, chaining key, handshake cipher
//!     |
//!     v
//! HandshakeMessage (messages.rs) -- CBOR records for the three XX messages
//!     |
//!     v
//! FrameSocket (frame.rs)      -- 3-byte big-endian length prefix over a byte stream
//!     |
//!     v
//! TCP / TLS stream
//! ```

pub mod cbor;
pub mod frame;
pub mod messages;
pub mod noise;
pub mod socket;

pub use frame::{FrameReader, FrameSocket, FrameWriter};
pub use noise::{NoiseHandshake, TransportKeys};
pub use socket::{NoiseSocket, NoiseWriter};

use std::time::Duration;

use tether_crypto::CryptoError;

/// Error types for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket read or write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a frame.
    #[error("truncated frame: stream ended inside the {0}")]
    Truncated(&'static str),

    /// The peer closed the stream at a frame boundary.
    #[error("connection closed")]
    Closed,

    /// A frame exceeds the configured maximum size.
    #[error("frame too large: {size} bytes, max {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// No response arrived before the deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The peer violated the framing or handshake protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// CBOR serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// CBOR deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The handshake cipher was used before any key was mixed in.
    #[error("noise state has no key yet")]
    NoKey,

    /// Cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::FrameTooLarge { size: 10, max: 5 };
        assert_eq!(err.to_string(), "frame too large: 10 bytes, max 5");
        assert_eq!(
            TransportError::Truncated("header").to_string(),
            "truncated frame: stream ended inside the header"
        );
    }

    #[test]
    fn test_crypto_error_keeps_source() {
        use std::error::Error as _;
        let err = TransportError::from(CryptoError::AeadDecryption);
        assert!(err.source().is_some());
    }
}
