//! Byte-exact container serialization, plus a from-scratch container
//! builder a literal re-serializer does not need (it only ever
//! re-emits an already-loaded or filtered container) but that a
//! complete encryption path requires.

use std::io::Write as IoWrite;

use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};
use rand_core::{OsRng, RngCore};

use crate::error::{HeaderError, KeyError};
use crate::header::packet::HeaderPacket;
use crate::key::Key;
use crate::wire::{MAGIC, MAX_BLOCK_CLEARTEXT_BYTES, NONCE_BYTES, VERSION};

/// Re-serializes a container's header packets and data blocks verbatim.
///
/// This is the literal reference operation: it does not reinterpret or
/// re-encrypt anything, it just writes the magic/version/count preamble
/// followed by each packet's and each block's raw bytes, in order. Used
/// by the identity and only-readable filters, and by add-recipient for
/// everything except the newly minted packets.
pub fn write_container(
    ostream: &mut dyn IoWrite,
    packets: &[Vec<u8>],
    blocks: impl Iterator<Item = Vec<u8>>,
) -> std::io::Result<()> {
    ostream.write_all(MAGIC)?;
    ostream.write_all(&VERSION.to_le_bytes())?;
    ostream.write_all(&(packets.len() as u32).to_le_bytes())?;
    for packet in packets {
        ostream.write_all(packet)?;
    }
    for block in blocks {
        ostream.write_all(&block)?;
    }
    Ok(())
}

/// Builds a brand-new container from cleartext: generates a Data
/// Encryption Key, seals a data-encryption-parameters packet per
/// recipient, and AEAD-encrypts each write in up-to-64KiB blocks.
pub struct Writer<W: IoWrite> {
    stream: W,
    dek: [u8; 32],
    packets: Vec<Vec<u8>>,
    blocks: Vec<Vec<u8>>,
}

impl<W: IoWrite> Writer<W> {
    pub fn new(stream: W) -> Self {
        let mut dek = [0u8; 32];
        OsRng.fill_bytes(&mut dek);
        Self {
            stream,
            dek,
            packets: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Seals a data-encryption-parameters packet carrying this writer's
    /// DEK for `reader_pub`, signed by `writer_key`.
    pub fn add_recipient(
        &mut self,
        writer_key: &dyn Key,
        reader_pub: &[u8; 32],
    ) -> Result<(), KeyError> {
        let mut content = Vec::with_capacity(40);
        content.extend_from_slice(&0u32.to_le_bytes()); // packet type: DEK params
        content.extend_from_slice(&0u32.to_le_bytes()); // data encryption method
        content.extend_from_slice(&self.dek);

        let packet = seal_header_packet(writer_key, reader_pub, &content)?;
        self.packets.push(packet);
        Ok(())
    }

    /// Encrypts `data` as one or more up-to-64KiB data blocks.
    pub fn write_data(&mut self, data: &[u8]) -> Result<(), KeyError> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.dek)
            .map_err(|e| KeyError::new(format!("invalid DEK: {e}")))?;
        for chunk in data.chunks(MAX_BLOCK_CLEARTEXT_BYTES) {
            let mut nonce = [0u8; NONCE_BYTES];
            OsRng.fill_bytes(&mut nonce);
            let ciphertext = cipher
                .encrypt(Nonce::from_slice(&nonce), chunk)
                .map_err(|e| KeyError::new(format!("block encryption failed: {e}")))?;
            let mut block = Vec::with_capacity(NONCE_BYTES + ciphertext.len());
            block.extend_from_slice(&nonce);
            block.extend_from_slice(&ciphertext);
            self.blocks.push(block);
        }
        Ok(())
    }

    /// Writes the assembled container to the underlying stream.
    pub fn finish(mut self) -> std::io::Result<()> {
        write_container(&mut self.stream, &self.packets, self.blocks.into_iter())
    }
}

/// Seals `content` as one header packet for `reader_pub`, returning the
/// packet's raw on-wire bytes (length prefix included).
pub fn seal_header_packet(
    writer_key: &dyn Key,
    reader_pub: &[u8; 32],
    content: &[u8],
) -> Result<Vec<u8>, KeyError> {
    let symmetric_key = writer_key.compute_write_symmetric(reader_pub)?;
    let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key)
        .map_err(|e| KeyError::new(format!("invalid symmetric key: {e}")))?;
    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), content)
        .map_err(|e| KeyError::new(format!("header packet encryption failed: {e}")))?;

    let length = (4 + 4 + 32 + NONCE_BYTES + ciphertext.len()) as u32;
    let mut packet = Vec::with_capacity(length as usize);
    packet.extend_from_slice(&length.to_le_bytes());
    packet.extend_from_slice(&0u32.to_le_bytes());
    packet.extend_from_slice(&writer_key.public_key());
    packet.extend_from_slice(&nonce);
    packet.extend_from_slice(&ciphertext);
    Ok(packet)
}

/// Collects the raw bytes of every header packet, for use with
/// [`write_container`].
pub fn packet_bytes(packets: &[HeaderPacket]) -> Result<Vec<Vec<u8>>, HeaderError> {
    Ok(packets.iter().map(|p| p.raw().to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::key::collection::KeyCollection;
    use crate::key::software::SoftwareKey;
    use std::sync::Arc;

    #[test]
    fn fresh_container_round_trips() {
        let writer_key = SoftwareKey::generate();
        let reader_key = SoftwareKey::generate();

        let mut bytes = Vec::new();
        let mut w = Writer::new(&mut bytes);
        w.add_recipient(&writer_key, &reader_key.public_key()).unwrap();
        w.write_data(b"Hello World!\n").unwrap();
        w.finish().unwrap();

        let reader_arc: Arc<dyn Key> = Arc::new(reader_key);
        let collection = KeyCollection::new(vec![reader_arc]).unwrap();
        let mut container = Container::open(std::io::Cursor::new(bytes), collection, true).unwrap();

        let header = container.header().unwrap();
        assert_eq!(header.packet_count(), 1);

        let blocks: Vec<_> = container.data_blocks().unwrap().collect();
        assert_eq!(blocks.len(), 1);
        let block = blocks.into_iter().next().unwrap().unwrap();
        assert_eq!(block.cleartext(), Some(b"Hello World!\n".as_slice()));
        assert_eq!(block.size(), 13);
    }
}
