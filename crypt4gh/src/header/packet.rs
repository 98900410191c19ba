//! Single header packet parsing and trial decryption.

use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, KeyInit, Nonce};

use crate::error::HeaderPacketError;
use crate::key::collection::KeyCollection;
use crate::wire::{
    NONCE_BYTES, PACKET_PREAMBLE_BYTES, PACKET_TYPE_DATA_ENCRYPTION_PARAMETERS,
    PACKET_TYPE_EDIT_LIST, X25519_KEY_BYTES,
};

use super::dek::Dek;

/// What was found once a packet's payload was decrypted (or not).
#[derive(Clone)]
pub enum PacketOutcome {
    /// No available reader key could authenticate this packet.
    Unreadable,
    /// A data-encryption-parameters packet: carries one DEK.
    DataEncryptionParameters { dek: Dek },
    /// An edit list packet; contents kept opaque at this layer, filters
    /// that need the numbers parse `content` themselves.
    EditList { content: Vec<u8> },
    /// A successfully decrypted packet of a type this crate does not
    /// otherwise interpret.
    Unknown { packet_type: u32, content: Vec<u8> },
}

/// One parsed header packet, readable or not.
#[derive(Clone)]
pub struct HeaderPacket {
    /// The verbatim on-wire bytes (length prefix included), kept so an
    /// unreadable packet can still be re-serialized byte-for-byte.
    raw: Vec<u8>,
    writer_public_key: [u8; X25519_KEY_BYTES],
    /// The reader key's public key that authenticated this packet, if any.
    reader_public_key: Option<[u8; X25519_KEY_BYTES]>,
    outcome: PacketOutcome,
}

impl HeaderPacket {
    /// Parses one length-prefixed packet from `stream`, trying every key
    /// in `reader_keys` (cursor-first order) to decrypt its payload.
    pub fn parse(
        stream: &mut dyn std::io::Read,
        reader_keys: &mut KeyCollection,
    ) -> Result<Self, HeaderPacketError> {
        let mut length_bytes = [0u8; 4];
        stream
            .read_exact(&mut length_bytes)
            .map_err(|e| HeaderPacketError::new(format!("failed to read packet length: {e}")))?;
        let packet_length = u32::from_le_bytes(length_bytes) as usize;
        if packet_length < PACKET_PREAMBLE_BYTES {
            return Err(HeaderPacketError::new(format!(
                "packet length {packet_length} is smaller than the fixed preamble"
            )));
        }

        let mut raw = vec![0u8; packet_length];
        raw[..4].copy_from_slice(&length_bytes);
        stream
            .read_exact(&mut raw[4..])
            .map_err(|e| HeaderPacketError::new(format!("truncated header packet: {e}")))?;

        let method = u32::from_le_bytes(raw[4..8].try_into().unwrap());
        if method != 0 {
            return Err(HeaderPacketError::new(format!(
                "unsupported header packet encryption method {method}"
            )));
        }
        let writer_public_key: [u8; X25519_KEY_BYTES] = raw[8..40].try_into().unwrap();
        let nonce: [u8; NONCE_BYTES] = raw[40..52].try_into().unwrap();
        let ciphertext_and_tag = &raw[52..];

        let mut reader_public_key = None;
        let mut decrypted = None;
        let candidates: Vec<(usize, std::sync::Arc<dyn crate::key::Key>)> = reader_keys
            .iter_from_cursor()
            .map(|(i, key)| (i, key.clone()))
            .collect();
        for (idx, key) in candidates {
            let symmetric_key = match key.compute_read_symmetric(&writer_public_key) {
                Ok(k) => k,
                Err(_) => continue,
            };
            let cipher = match ChaCha20Poly1305::new_from_slice(&symmetric_key) {
                Ok(c) => c,
                Err(_) => continue,
            };
            if let Ok(content) = cipher.decrypt(Nonce::from_slice(&nonce), ciphertext_and_tag) {
                reader_keys.report_success(idx);
                tracing::debug!(key_index = idx, "header packet decrypted, cursor advanced");
                reader_public_key = Some(key.public_key());
                decrypted = Some(content);
                break;
            }
        }

        let outcome = match decrypted {
            None => {
                tracing::warn!("header packet unreadable by any available key");
                PacketOutcome::Unreadable
            }
            Some(content) => Self::classify(&content)?,
        };

        Ok(Self {
            raw,
            writer_public_key,
            reader_public_key,
            outcome,
        })
    }

    fn classify(content: &[u8]) -> Result<PacketOutcome, HeaderPacketError> {
        if content.len() < 4 {
            return Err(HeaderPacketError::new(
                "decrypted packet content too short to contain a packet type",
            ));
        }
        let packet_type = u32::from_le_bytes(content[0..4].try_into().unwrap());
        match packet_type {
            t if t == PACKET_TYPE_DATA_ENCRYPTION_PARAMETERS => {
                if content.len() < 8 {
                    return Err(HeaderPacketError::new(
                        "data encryption parameters packet missing method field",
                    ));
                }
                let method = u32::from_le_bytes(content[4..8].try_into().unwrap());
                if method != 0 {
                    return Err(HeaderPacketError::new(format!(
                        "unknown data encryption method {method}"
                    )));
                }
                let dek = Dek::from_bytes(&content[8..40])
                    .map_err(|e| HeaderPacketError::new(e.to_string()))?;
                Ok(PacketOutcome::DataEncryptionParameters { dek })
            }
            t if t == PACKET_TYPE_EDIT_LIST => Ok(PacketOutcome::EditList {
                content: content.to_vec(),
            }),
            other => Ok(PacketOutcome::Unknown {
                packet_type: other,
                content: content.to_vec(),
            }),
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn writer_public_key(&self) -> &[u8; X25519_KEY_BYTES] {
        &self.writer_public_key
    }

    pub fn reader_public_key(&self) -> Option<&[u8; X25519_KEY_BYTES]> {
        self.reader_public_key.as_ref()
    }

    pub fn outcome(&self) -> &PacketOutcome {
        &self.outcome
    }

    pub fn is_readable(&self) -> bool {
        !matches!(self.outcome, PacketOutcome::Unreadable)
    }

    pub fn is_data_encryption_parameters(&self) -> bool {
        matches!(self.outcome, PacketOutcome::DataEncryptionParameters { .. })
    }

    pub fn is_edit_list(&self) -> bool {
        matches!(self.outcome, PacketOutcome::EditList { .. })
    }

    pub fn dek(&self) -> Option<&Dek> {
        match &self.outcome {
            PacketOutcome::DataEncryptionParameters { dek } => Some(dek),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::software::SoftwareKey;
    use crate::key::Key;
    use std::sync::Arc;

    fn seal_packet(writer: &SoftwareKey, reader_pub: [u8; 32], content: &[u8]) -> Vec<u8> {
        let symmetric_key = writer.compute_write_symmetric(&reader_pub).unwrap();
        let cipher = ChaCha20Poly1305::new_from_slice(&symmetric_key).unwrap();
        let nonce = [5u8; NONCE_BYTES];
        let ciphertext = cipher.encrypt(Nonce::from_slice(&nonce), content).unwrap();

        let mut packet = Vec::new();
        let length = (4 + 4 + 32 + NONCE_BYTES + ciphertext.len()) as u32;
        packet.extend_from_slice(&length.to_le_bytes());
        packet.extend_from_slice(&0u32.to_le_bytes());
        packet.extend_from_slice(&writer.public_key());
        packet.extend_from_slice(&nonce);
        packet.extend_from_slice(&ciphertext);
        packet
    }

    #[test]
    fn parses_readable_dek_packet() {
        let writer = SoftwareKey::generate();
        let reader = SoftwareKey::generate();

        let mut content = Vec::new();
        content.extend_from_slice(&0u32.to_le_bytes());
        content.extend_from_slice(&0u32.to_le_bytes());
        content.extend_from_slice(&[42u8; 32]);

        let packet_bytes = seal_packet(&writer, reader.public_key(), &content);
        let mut stream = std::io::Cursor::new(packet_bytes);

        let reader_arc: Arc<dyn Key> = Arc::new(reader);
        let mut collection = KeyCollection::new(vec![reader_arc]).unwrap();
        let packet = HeaderPacket::parse(&mut stream, &mut collection).unwrap();

        assert!(packet.is_readable());
        assert!(packet.is_data_encryption_parameters());
        assert_eq!(packet.dek().unwrap().0, [42u8; 32]);
        assert_eq!(packet.writer_public_key(), &writer.public_key());
    }

    #[test]
    fn unreadable_without_matching_key() {
        let writer = SoftwareKey::generate();
        let reader = SoftwareKey::generate();
        let stranger = SoftwareKey::generate();

        let packet_bytes = seal_packet(&writer, reader.public_key(), b"irrelevant content!!!!");
        let mut stream = std::io::Cursor::new(packet_bytes);

        let stranger_arc: Arc<dyn Key> = Arc::new(stranger);
        let mut collection = KeyCollection::new(vec![stranger_arc]).unwrap();
        let packet = HeaderPacket::parse(&mut stream, &mut collection).unwrap();

        assert!(!packet.is_readable());
    }
}
