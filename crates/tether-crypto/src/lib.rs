//! # tether-crypto
//!
//! Leaf cryptographic primitives for the multi-device secure channel.
//!
//! The suite is fixed by the handshake protocol name
//! (`Noise_XX_25519_AESGCM_SHA256`); nothing here negotiates algorithms.
//!
//! ## Modules
//!
//! - [`keys`]: Curve25519 keypairs, one-time prekeys and signed prekeys
//! - [`xeddsa`]: XEdDSA signatures made with Curve25519 keys
//! - [`aead`]: AES-256-GCM cipher state with counter-derived IVs
//! - [`kdf`]: SHA-256 and HKDF-SHA256 extract-and-expand
//! - [`ed25519`]: Ed25519 verification for issuer-signed certificates

pub mod aead;
pub mod ed25519;
pub mod kdf;
pub mod keys;
pub mod xeddsa;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD sealing failed.
    #[error("AEAD encryption failed")]
    AeadEncryption,

    /// AEAD opening failed (authentication tag mismatch).
    #[error("AEAD decryption failed")]
    AeadDecryption,

    /// The 32-bit nonce counter of a cipher state has been used up.
    #[error("nonce counter exhausted")]
    NonceExhausted,

    /// Diffie-Hellman produced an all-zero (non-contributory) secret.
    #[error("non-contributory Diffie-Hellman result")]
    NonContributory,

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// Invalid public key encoding.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Prekey ids are 24-bit.
    #[error("prekey id {0} exceeds 24 bits")]
    InvalidPreKeyId(u32),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
