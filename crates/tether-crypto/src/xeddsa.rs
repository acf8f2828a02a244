//! XEdDSA signatures over Curve25519 keys.
//!
//! Lets a single X25519 identity key both agree keys and sign prekeys.
//! The Edwards public key is derived from the Montgomery `u` coordinate with
//! the sign bit forced to zero; the signer negates its scalar when needed so
//! its own Edwards point matches that convention.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::keys::{KEY_SIZE, SIGNATURE_SIZE};
use crate::{CryptoError, Result};

/// Sign `message` with a clamped Curve25519 private scalar.
///
/// `random` must be 64 bytes of fresh randomness.
pub fn sign(
    private: &[u8; KEY_SIZE],
    message: &[u8],
    random: &[u8; 64],
) -> [u8; SIGNATURE_SIZE] {
    let k = Scalar::from_bytes_mod_order(*private);
    let edwards = EdwardsPoint::mul_base(&k).compress();
    let mut a = if edwards.as_bytes()[31] >> 7 == 1 { -k } else { k };

    let mut public = edwards.to_bytes();
    public[31] &= 0x7F;

    // r = hash1(a || M || Z)
    let mut hasher = Sha512::new();
    hasher.update([0xFE]);
    hasher.update([0xFF; 31]);
    hasher.update(a.as_bytes());
    hasher.update(message);
    hasher.update(random);
    let mut r = wide_scalar(hasher);

    let big_r = EdwardsPoint::mul_base(&r).compress();
    let h = challenge(big_r.as_bytes(), &public, message);
    let s = r + h * a;

    a.zeroize();
    r.zeroize();

    let mut signature = [0u8; SIGNATURE_SIZE];
    signature[..32].copy_from_slice(big_r.as_bytes());
    signature[32..].copy_from_slice(s.as_bytes());
    signature
}

/// Verify an XEdDSA signature against a Curve25519 public key.
pub fn verify(
    public: &[u8; KEY_SIZE],
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
) -> Result<()> {
    let mut u = *public;
    u[31] &= 0x7F;
    let a_point = MontgomeryPoint(u)
        .to_edwards(0)
        .ok_or(CryptoError::InvalidPublicKey)?;
    if !a_point.is_torsion_free() {
        return Err(CryptoError::InvalidPublicKey);
    }

    let mut r_bytes = [0u8; 32];
    let mut s_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&signature[..32]);
    s_bytes.copy_from_slice(&signature[32..]);

    if s_bytes[31] & 0xE0 != 0 {
        return Err(CryptoError::SignatureVerification);
    }
    let s: Scalar = Option::from(Scalar::from_canonical_bytes(s_bytes))
        .ok_or(CryptoError::SignatureVerification)?;

    let h = challenge(&r_bytes, a_point.compress().as_bytes(), message);
    // R' = sB - hA
    let r_check = EdwardsPoint::vartime_double_scalar_mul_basepoint(&h, &-a_point, &s).compress();

    if bool::from(r_check.as_bytes()[..].ct_eq(&r_bytes[..])) {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerification)
    }
}

fn challenge(r: &[u8; 32], public: &[u8; 32], message: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(r);
    hasher.update(public);
    hasher.update(message);
    wide_scalar(hasher)
}

fn wide_scalar(hasher: Sha512) -> Scalar {
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    let scalar = Scalar::from_bytes_mod_order_wide(&wide);
    wide.zeroize();
    scalar
}
