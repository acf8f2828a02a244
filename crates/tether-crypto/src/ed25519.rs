//! Ed25519 verification of issuer-signed certificate details.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::{CryptoError, Result};

/// Verify an Ed25519 `signature` over `message` made by `issuer`.
pub fn verify(issuer: &[u8; 32], message: &[u8], signature: &[u8]) -> Result<()> {
    let key = VerifyingKey::from_bytes(issuer).map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature =
        Signature::from_slice(signature).map_err(|_| CryptoError::SignatureVerification)?;
    key.verify(message, &signature)
        .map_err(|_| CryptoError::SignatureVerification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    #[test]
    fn test_verify_valid_signature() {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        let signature = signing.sign(b"certificate details");
        verify(
            signing.verifying_key().as_bytes(),
            b"certificate details",
            &signature.to_bytes(),
        )
        .expect("valid");
    }

    #[test]
    fn test_verify_rejects_short_signature() {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        assert!(verify(signing.verifying_key().as_bytes(), b"x", &[0u8; 10]).is_err());
    }

    #[test]
    fn test_verify_rejects_other_message() {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        let signature = signing.sign(b"one");
        assert!(verify(signing.verifying_key().as_bytes(), b"two", &signature.to_bytes()).is_err());
    }
}
