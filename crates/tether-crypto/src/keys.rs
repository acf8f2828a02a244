//! Curve25519 keypairs and the prekey records built on them.
//!
//! A [`KeyPair`] serves both the Noise handshake (static and ephemeral keys)
//! and the end-to-end layer (identity key, one-time prekeys). The identity
//! key also signs the current [`SignedPreKey`] through XEdDSA.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{xeddsa, CryptoError, Result};

/// Size of public and private keys in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of an XEdDSA signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Exclusive upper bound of prekey ids (ids are 24-bit).
pub const PRE_KEY_ID_LIMIT: u32 = 1 << 24;

/// Key type prefix prepended to a public key before it is signed.
pub const DJB_TYPE: u8 = 0x05;

/// A Curve25519 keypair. The private scalar is clamped and wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    public: [u8; KEY_SIZE],
    private: [u8; KEY_SIZE],
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut private = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng.fill_bytes(private.as_mut());
        Self::from_private(*private)
    }

    /// Rebuild a keypair from its private scalar, clamping it first.
    pub fn from_private(mut private: [u8; KEY_SIZE]) -> Self {
        clamp(&mut private);
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret).to_bytes();
        Self { public, private }
    }

    /// The public key.
    pub fn public(&self) -> &[u8; KEY_SIZE] {
        &self.public
    }

    /// The clamped private scalar.
    pub fn private(&self) -> &[u8; KEY_SIZE] {
        &self.private
    }

    /// X25519 agreement with a remote public key.
    ///
    /// Low-order remote keys produce an all-zero output; that is rejected.
    pub fn diffie_hellman(
        &self,
        remote_public: &[u8; KEY_SIZE],
    ) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        let secret = StaticSecret::from(self.private);
        let shared = secret.diffie_hellman(&PublicKey::from(*remote_public));
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributory);
        }
        Ok(Zeroizing::new(shared.to_bytes()))
    }

    /// Sign a message with this key using XEdDSA.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        let mut random = Zeroizing::new([0u8; 64]);
        OsRng.fill_bytes(random.as_mut());
        xeddsa::sign(&self.private, message, &random)
    }

    /// Create a signed prekey with the given id, signed by this (identity) key.
    pub fn create_signed_pre_key(&self, key_id: u32) -> Result<SignedPreKey> {
        check_pre_key_id(key_id)?;
        let key_pair = KeyPair::generate();
        let signature = self.sign(&signable_public(key_pair.public()));
        Ok(SignedPreKey {
            key_id,
            key_pair,
            signature,
        })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex_prefix(&self.public))
            .finish_non_exhaustive()
    }
}

/// A one-time prekey.
#[derive(Clone, Debug)]
pub struct PreKey {
    pub key_id: u32,
    pub key_pair: KeyPair,
}

impl PreKey {
    /// Generate a fresh one-time prekey with the given id.
    pub fn generate(key_id: u32) -> Result<Self> {
        check_pre_key_id(key_id)?;
        Ok(Self {
            key_id,
            key_pair: KeyPair::generate(),
        })
    }
}

/// The device's current signed prekey.
#[derive(Clone, Debug)]
pub struct SignedPreKey {
    pub key_id: u32,
    pub key_pair: KeyPair,
    pub signature: [u8; SIGNATURE_SIZE],
}

impl SignedPreKey {
    /// Verify the signature against the identity public key that made it.
    pub fn verify(&self, identity_public: &[u8; KEY_SIZE]) -> Result<()> {
        xeddsa::verify(
            identity_public,
            &signable_public(self.key_pair.public()),
            &self.signature,
        )
    }
}

/// `0x05 || public`, the byte string covered by a prekey signature.
pub fn signable_public(public: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE + 1] {
    let mut out = [0u8; KEY_SIZE + 1];
    out[0] = DJB_TYPE;
    out[1..].copy_from_slice(public);
    out
}

fn check_pre_key_id(key_id: u32) -> Result<()> {
    if key_id >= PRE_KEY_ID_LIMIT {
        return Err(CryptoError::InvalidPreKeyId(key_id));
    }
    Ok(())
}

/// RFC 7748 clamping.
fn clamp(scalar: &mut [u8; KEY_SIZE]) {
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}
