//! Re-seals the decryptable header packets for additional recipients.
//!
//! A single ephemeral X25519 keypair is lazily created the first time any
//! packet needs re-sealing, then reused for every remaining packet and
//! recipient in that call — `ekey` is initialized to `None` once outside
//! the recipient loop, not once per recipient. Re-sealing with a fresh
//! signer per packet would work just as well cryptographically, but the
//! shared-ephemeral-key behavior is preserved deliberately.

use crate::header::packet::{HeaderPacket, PacketOutcome};
use crate::key::software::SoftwareKey;
use crate::writer::seal_header_packet;
use crate::error::KeyError;

/// Appends, for every `recipient` and every original readable
/// data-encryption-parameters or edit-list packet, a freshly sealed
/// packet carrying that packet's content to the recipient. Original
/// packets (readable or not) are kept verbatim at the front of the
/// returned list, matching the original packet count plus
/// `recipients.len() * readable_resealable_packets`.
pub fn add_recipient(
    packets: &[HeaderPacket],
    recipients: &[[u8; 32]],
) -> Result<Vec<Vec<u8>>, KeyError> {
    let mut out: Vec<Vec<u8>> = packets.iter().map(|p| p.raw().to_vec()).collect();
    let mut ekey: Option<SoftwareKey> = None;

    for recipient in recipients {
        for packet in packets {
            let content = match packet.outcome() {
                PacketOutcome::DataEncryptionParameters { dek } => {
                    let mut content = Vec::with_capacity(40);
                    content.extend_from_slice(&0u32.to_le_bytes());
                    content.extend_from_slice(&0u32.to_le_bytes());
                    content.extend_from_slice(&dek.0);
                    content
                }
                PacketOutcome::EditList { content } => content.clone(),
                _ => continue,
            };

            let key = ekey.get_or_insert_with(SoftwareKey::generate);
            out.push(seal_header_packet(key, recipient, &content)?);
        }
    }

    Ok(out)
}
