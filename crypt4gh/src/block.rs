//! Data block reading and circular DEK trial decryption.

use std::io::Read;

use crate::header::dek::DekCollection;
use crate::wire::{MAX_BLOCK_CLEARTEXT_BYTES, NONCE_BYTES, TAG_BYTES};

/// A single data block, successfully deciphered or left opaque.
pub struct DataBlock {
    /// On-wire bytes: nonce + ciphertext + tag.
    ciphertext: Vec<u8>,
    cleartext: Option<Vec<u8>>,
    dek_index: Option<usize>,
    offset: u64,
}

impl DataBlock {
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn cleartext(&self) -> Option<&[u8]> {
        self.cleartext.as_deref()
    }

    pub fn is_deciphered(&self) -> bool {
        self.cleartext.is_some()
    }

    pub fn dek_index(&self) -> Option<usize> {
        self.dek_index
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Cleartext size of this block, regardless of whether it was
    /// deciphered (on-wire size minus the fixed nonce/tag overhead).
    pub fn size(&self) -> u64 {
        (self.ciphertext.len() - NONCE_BYTES - TAG_BYTES) as u64
    }
}

/// Reads and, if `deks` is `Some`, decrypts one data block from `stream`.
/// Returns `None` at a clean end of stream.
pub fn read_block(
    stream: &mut dyn Read,
    deks: Option<&mut DekCollection>,
    offset: u64,
) -> std::io::Result<Option<DataBlock>> {
    let mut nonce = [0u8; NONCE_BYTES];
    let nonce_read = read_exact_or_eof(stream, &mut nonce)?;
    if nonce_read < NONCE_BYTES {
        // 0 bytes is a clean EOF; 1..11 bytes is a truncated nonce, tolerated
        // as EOF too rather than raised as an error.
        return Ok(None);
    }

    let mut body = vec![0u8; MAX_BLOCK_CLEARTEXT_BYTES + TAG_BYTES];
    let read = read_partial(stream, &mut body)?;
    if read < TAG_BYTES {
        // Body shorter than the MAC tag can't possibly authenticate; treated
        // as EOF rather than an error.
        return Ok(None);
    }
    body.truncate(read);

    let mut ciphertext = Vec::with_capacity(NONCE_BYTES + body.len());
    ciphertext.extend_from_slice(&nonce);
    ciphertext.extend_from_slice(&body);

    let (cleartext, dek_index) = match deks {
        Some(deks) if !deks.is_empty() => match deks.try_decrypt(&nonce, &body) {
            Some((clear, idx)) => (Some(clear), Some(idx)),
            None => (None, None),
        },
        _ => (None, None),
    };

    Ok(Some(DataBlock {
        ciphertext,
        cleartext,
        dek_index,
        offset,
    }))
}

/// Reads into `buf`, returning `0` only on a clean EOF with nothing read.
fn read_exact_or_eof(stream: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    read_partial(stream, buf)
}

fn read_partial(stream: &mut dyn Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match stream.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::dek::Dek;
    use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};

    #[test]
    fn reads_and_decrypts_single_block() {
        let dek = [4u8; 32];
        let cipher = ChaCha20Poly1305::new_from_slice(&dek).unwrap();
        let nonce = [1u8; NONCE_BYTES];
        let ciphertext = cipher.encrypt(Nonce::from_slice(&nonce), b"payload".as_slice()).unwrap();

        let mut wire = Vec::new();
        wire.extend_from_slice(&nonce);
        wire.extend_from_slice(&ciphertext);

        let mut deks = DekCollection::new();
        deks.add(Dek(dek));

        let mut stream = std::io::Cursor::new(wire);
        let block = read_block(&mut stream, Some(&mut deks), 0).unwrap().unwrap();
        assert_eq!(block.cleartext(), Some(b"payload".as_slice()));
        assert_eq!(block.dek_index(), Some(0));
    }

    #[test]
    fn eof_on_empty_stream_returns_none() {
        let mut stream = std::io::Cursor::new(Vec::<u8>::new());
        let mut deks = DekCollection::new();
        let block = read_block(&mut stream, Some(&mut deks), 0).unwrap();
        assert!(block.is_none());
    }

    #[test]
    fn opaque_mode_never_decrypts() {
        let dek = [4u8; 32];
        let cipher = ChaCha20Poly1305::new_from_slice(&dek).unwrap();
        let nonce = [1u8; NONCE_BYTES];
        let ciphertext = cipher.encrypt(Nonce::from_slice(&nonce), b"payload".as_slice()).unwrap();
        let mut wire = Vec::new();
        wire.extend_from_slice(&nonce);
        wire.extend_from_slice(&ciphertext);

        let mut stream = std::io::Cursor::new(wire);
        let block = read_block(&mut stream, None, 0).unwrap().unwrap();
        assert!(!block.is_deciphered());
    }
}
