//! SHA-256 hashing and HKDF-SHA256.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{CryptoError, Result};

/// Output size of SHA-256.
pub const HASH_SIZE: usize = 32;

/// SHA-256 of the concatenation of `parts`.
pub fn sha256(parts: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// HKDF-SHA256 with empty info, expanded to two 32-byte outputs.
///
/// Used both to ratchet the handshake chaining key (`salt` is the chaining
/// key, `ikm` the DH output) and to split the final transport keys (`ikm`
/// empty).
pub fn extract_and_expand(
    salt: &[u8],
    ikm: &[u8],
) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>)> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; 64]);
    hk.expand(&[], okm.as_mut())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut first = Zeroizing::new([0u8; 32]);
    let mut second = Zeroizing::new([0u8; 32]);
    first.copy_from_slice(&okm[..32]);
    second.copy_from_slice(&okm[32..]);
    Ok((first, second))
}
