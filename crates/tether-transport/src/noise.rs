//! Noise XX symmetric state: transcript hash, chaining key, handshake cipher.
//!
//! The state is driven step by step by the handshake driver; the order of
//! [`NoiseHandshake::mix_shared_secret`] calls is part of the protocol.
//! [`NoiseHandshake::finish`] consumes the state and splits the chaining key
//! into the two directional transport keys.

use tether_crypto::aead::CipherState;
use tether_crypto::kdf::{self, HASH_SIZE};
use tether_crypto::keys::{KeyPair, KEY_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{Result, TransportError};

/// Protocol name, padded to exactly one hash length.
pub const NOISE_START_PATTERN: &[u8; 32] = b"Noise_XX_25519_AESGCM_SHA256\0\0\0\0";

/// Handshake symmetric state.
pub struct NoiseHandshake {
    hash: [u8; HASH_SIZE],
    salt: Zeroizing<[u8; HASH_SIZE]>,
    cipher: Option<CipherState>,
}

/// Directional keys produced by a completed handshake.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TransportKeys {
    write: [u8; KEY_SIZE],
    read: [u8; KEY_SIZE],
}

impl NoiseHandshake {
    /// Initialize from the protocol name and mix in the prologue.
    ///
    /// A 32-byte name is used as the initial hash directly; any other length
    /// is hashed first.
    pub fn start(pattern: &[u8], prologue: &[u8]) -> Self {
        let hash = match <[u8; HASH_SIZE]>::try_from(pattern) {
            Ok(h) => h,
            Err(_) => kdf::sha256(&[pattern]),
        };
        let mut state = Self {
            hash,
            salt: Zeroizing::new(hash),
            cipher: None,
        };
        state.authenticate(prologue);
        state
    }

    /// Current transcript hash.
    pub fn hash(&self) -> &[u8; HASH_SIZE] {
        &self.hash
    }

    /// Mix public material into the transcript.
    pub fn authenticate(&mut self, data: &[u8]) {
        self.hash = kdf::sha256(&[self.hash.as_slice(), data]);
    }

    /// Ratchet the chaining key with `data` and rekey the handshake cipher.
    pub fn mix_into_key(&mut self, data: &[u8]) -> Result<()> {
        let (salt, key) = kdf::extract_and_expand(&self.salt[..], data)?;
        self.salt = salt;
        self.cipher = Some(CipherState::new(&key));
        Ok(())
    }

    /// X25519 with `local` and `remote`, mixed into the chaining key.
    pub fn mix_shared_secret(&mut self, local: &KeyPair, remote: &[u8; KEY_SIZE]) -> Result<()> {
        let secret = local.diffie_hellman(remote)?;
        self.mix_into_key(&secret[..])
    }

    /// Seal with the transcript as associated data, then absorb the ciphertext.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher.as_mut().ok_or(TransportError::NoKey)?;
        let ciphertext = cipher.encrypt(plaintext, &self.hash)?;
        self.authenticate(&ciphertext);
        Ok(ciphertext)
    }

    /// Open with the transcript as associated data, then absorb the ciphertext.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher.as_mut().ok_or(TransportError::NoKey)?;
        let plaintext = cipher.decrypt(ciphertext, &self.hash)?;
        self.authenticate(ciphertext);
        Ok(plaintext)
    }

    /// Split the chaining key into transport keys, consuming the state.
    pub fn finish(self) -> Result<TransportKeys> {
        let (write, read) = kdf::extract_and_expand(&self.salt[..], &[])?;
        Ok(TransportKeys {
            write: *write,
            read: *read,
        })
    }
}

impl TransportKeys {
    pub fn new(write: [u8; KEY_SIZE], read: [u8; KEY_SIZE]) -> Self {
        Self { write, read }
    }

    /// Key sealing outgoing frames.
    pub fn write_key(&self) -> &[u8; KEY_SIZE] {
        &self.write
    }

    /// Key opening incoming frames.
    pub fn read_key(&self) -> &[u8; KEY_SIZE] {
        &self.read
    }

    /// The responder's view: what the initiator writes, it reads.
    pub fn swapped(&self) -> Self {
        Self {
            write: self.read,
            read: self.write,
        }
    }
}

impl std::fmt::Debug for TransportKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportKeys").finish_non_exhaustive()
    }
}
