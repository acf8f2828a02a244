//! AES-256-GCM cipher state with counter-derived IVs.
//!
//! Both the handshake and the post-handshake transport seal with a per-key
//! counter. The 12-byte IV is all zero except its last four bytes, which hold
//! the big-endian counter. The counter advances only after a successful
//! operation, so a failed open leaves the state as it was.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::{CryptoError, Result};

/// IV size for AES-GCM (96 bits).
pub const IV_SIZE: usize = 12;

/// Key size (256 bits).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size (128 bits).
pub const TAG_SIZE: usize = 16;

/// Build the IV for a given counter value.
pub fn generate_iv(counter: u32) -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    iv[8..].copy_from_slice(&counter.to_be_bytes());
    iv
}

/// A keyed AEAD with its own nonce counter.
pub struct CipherState {
    cipher: Aes256Gcm,
    counter: u32,
    exhausted: bool,
}

impl CipherState {
    /// Create a cipher state with the counter at zero.
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            counter: 0,
            exhausted: false,
        }
    }

    /// Counter value the next operation will use.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Seal `plaintext` with the current counter, binding `aad`.
    pub fn encrypt(&mut self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let iv = self.next_iv()?;
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), Payload { msg: plaintext, aad })
            .map_err(|_| CryptoError::AeadEncryption)?;
        self.advance();
        Ok(ciphertext)
    }

    /// Open `ciphertext` with the current counter, checking `aad`.
    pub fn decrypt(&mut self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let iv = self.next_iv()?;
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), Payload { msg: ciphertext, aad })
            .map_err(|_| CryptoError::AeadDecryption)?;
        self.advance();
        Ok(plaintext)
    }

    fn next_iv(&self) -> Result<[u8; IV_SIZE]> {
        if self.exhausted {
            return Err(CryptoError::NonceExhausted);
        }
        Ok(generate_iv(self.counter))
    }

    fn advance(&mut self) {
        match self.counter.checked_add(1) {
            Some(next) => self.counter = next,
            None => self.exhausted = true,
        }
    }
}
