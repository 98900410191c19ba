//! Data Encryption Key storage and circular trial decryption.

use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};

use crate::error::DekError;
use crate::wire::DEK_BYTES;

/// A single Data Encryption Key extracted from a data-encryption-parameters
/// header packet.
#[derive(Clone, PartialEq, Eq)]
pub struct Dek(pub [u8; DEK_BYTES]);

impl Dek {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DekError> {
        let array: [u8; DEK_BYTES] = bytes
            .try_into()
            .map_err(|_| DekError::new(format!("DEK must be {DEK_BYTES} bytes, got {}", bytes.len())))?;
        Ok(Dek(array))
    }
}

/// A deduplicated set of DEKs tried in circular, last-successful-first
/// order against data block ciphertexts.
#[derive(Default)]
pub struct DekCollection {
    deks: Vec<Dek>,
    current: usize,
}

impl DekCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.deks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deks.is_empty()
    }

    /// Adds `dek` unless an identical key is already present.
    pub fn add(&mut self, dek: Dek) {
        if !self.deks.contains(&dek) {
            self.deks.push(dek);
        }
    }

    pub fn get(&self, idx: usize) -> Option<&Dek> {
        self.deks.get(idx)
    }

    /// Tries every DEK, starting from the last one that worked, against
    /// `nonce`+`ciphertext_and_tag`. Returns the cleartext and the index
    /// of the DEK that worked, or `None` if none of them authenticate.
    /// The cursor is left at the successful index (or unchanged if none
    /// worked) so the next block starts there.
    pub fn try_decrypt(
        &mut self,
        nonce: &[u8; 12],
        ciphertext_and_tag: &[u8],
    ) -> Option<(Vec<u8>, usize)> {
        if self.deks.is_empty() {
            return None;
        }
        let start = self.current;
        let mut idx = start;
        loop {
            let dek = &self.deks[idx];
            if let Ok(cipher) = ChaCha20Poly1305::new_from_slice(&dek.0) {
                if let Ok(cleartext) = cipher.decrypt(Nonce::from_slice(nonce), ciphertext_and_tag)
                {
                    self.current = idx;
                    tracing::debug!(dek_index = idx, "data block decrypted, cursor advanced");
                    return Some((cleartext, idx));
                }
            }
            idx = (idx + 1) % self.deks.len();
            if idx == start {
                tracing::warn!("data block unreadable under any available DEK");
                return None;
            }
        }
    }
}
