//! Container header: magic/version/count plus the packet list, loaded
//! lazily.

pub mod dek;
pub mod packet;

use std::io::Read;

use crate::error::HeaderError;
use crate::key::collection::KeyCollection;
use crate::wire::{MAGIC, VERSION};

use dek::DekCollection;
use packet::{HeaderPacket, PacketOutcome};

/// The parsed header of a Crypt4GH container.
///
/// Packets are not decrypted until [`Header::load_packets`] is first
/// called, matching the Python implementation's lazy loading — callers
/// that only want `decrypt=false` opaque passthrough never pay for a
/// reader key at all. The backing stream is owned by
/// [`crate::container::Container`], not the header, so it can also
/// drive data-block reads afterwards.
pub struct Header {
    packet_count: u32,
    packets: Option<Vec<HeaderPacket>>,
    deks: DekCollection,
}

impl Header {
    /// Reads and validates the magic, version, and packet count from
    /// `stream`, deferring packet parsing until [`Header::load_packets`].
    pub fn parse(stream: &mut dyn Read) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 8];
        stream
            .read_exact(&mut magic)
            .map_err(|e| HeaderError::new(format!("failed to read magic: {e}")))?;
        if &magic != MAGIC {
            return Err(HeaderError::new("not a Crypt4GH container (bad magic)"));
        }

        let mut version_bytes = [0u8; 4];
        stream
            .read_exact(&mut version_bytes)
            .map_err(|e| HeaderError::new(format!("failed to read version: {e}")))?;
        let version = u32::from_le_bytes(version_bytes);
        if version != VERSION {
            return Err(HeaderError::new(format!(
                "unsupported Crypt4GH version {version}"
            )));
        }

        let mut count_bytes = [0u8; 4];
        stream
            .read_exact(&mut count_bytes)
            .map_err(|e| HeaderError::new(format!("failed to read packet count: {e}")))?;
        let packet_count = u32::from_le_bytes(count_bytes);

        Ok(Self {
            packet_count,
            packets: None,
            deks: DekCollection::new(),
        })
    }

    /// Parses every header packet from `stream` against `reader_keys` and
    /// populates the DEK collection. Idempotent: a second call is a no-op.
    pub fn load_packets(
        &mut self,
        stream: &mut dyn Read,
        reader_keys: &mut KeyCollection,
    ) -> Result<(), HeaderError> {
        if self.packets.is_some() {
            return Ok(());
        }
        let mut packets = Vec::with_capacity(self.packet_count as usize);
        for _ in 0..self.packet_count {
            let packet = HeaderPacket::parse(stream, reader_keys)?;
            if let PacketOutcome::DataEncryptionParameters { dek } = packet.outcome() {
                self.deks.add(dek.clone());
            }
            packets.push(packet);
        }
        self.packets = Some(packets);
        Ok(())
    }

    pub fn packet_count(&self) -> u32 {
        self.packet_count
    }

    pub fn is_loaded(&self) -> bool {
        self.packets.is_some()
    }

    pub fn packets(&self) -> Option<&[HeaderPacket]> {
        self.packets.as_deref()
    }

    pub fn deks(&mut self) -> &mut DekCollection {
        &mut self.deks
    }

    pub fn deks_ref(&self) -> &DekCollection {
        &self.deks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::software::SoftwareKey;
    use crate::key::Key;
    use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};
    use std::sync::Arc;

    fn build_header_bytes(writer: &SoftwareKey, reader_pub: [u8; 32], dek: [u8; 32]) -> Vec<u8> {
        let mut content = Vec::new();
        content.extend_from_slice(&0u32.to_le_bytes());
        content.extend_from_slice(&0u32.to_le_bytes());
        content.extend_from_slice(&dek);

        let symmetric_key = writer.compute_write_symmetric(&reader_pub).unwrap();
        let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key).unwrap();
        let nonce = [3u8; 12];
        let ciphertext = cipher.encrypt(Nonce::from_slice(&nonce), content.as_slice()).unwrap();

        let mut packet = Vec::new();
        let length = (4 + 4 + 32 + 12 + ciphertext.len()) as u32;
        packet.extend_from_slice(&length.to_le_bytes());
        packet.extend_from_slice(&0u32.to_le_bytes());
        packet.extend_from_slice(&writer.public_key());
        packet.extend_from_slice(&nonce);
        packet.extend_from_slice(&ciphertext);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&packet);
        bytes
    }

    #[test]
    fn loads_single_dek_packet() {
        let writer = SoftwareKey::generate();
        let reader = SoftwareKey::generate();
        let header_bytes = build_header_bytes(&writer, reader.public_key(), [11u8; 32]);
        let mut stream = std::io::Cursor::new(header_bytes);

        let reader_arc: Arc<dyn Key> = Arc::new(reader);
        let mut collection = KeyCollection::new(vec![reader_arc]).unwrap();
        let mut header = Header::parse(&mut stream).unwrap();

        assert_eq!(header.packet_count(), 1);
        header.load_packets(&mut stream, &mut collection).unwrap();
        let deks = header.deks();
        assert_eq!(deks.count(), 1);
        assert_eq!(deks.get(0).unwrap().0, [11u8; 32]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut stream = std::io::Cursor::new(b"notcrypt".to_vec());
        assert!(Header::parse(&mut stream).is_err());
    }
}
