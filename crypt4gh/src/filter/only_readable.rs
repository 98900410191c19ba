//! Drops packets no available key could decrypt.

use crate::header::packet::HeaderPacket;

/// Returns the raw bytes of every readable packet, dropping the rest.
///
/// Useful for re-sharing a container after stripping packets sealed for
/// keys the current process no longer needs to retain — the resulting
/// packet count is generally smaller than the original's.
pub fn only_readable(packets: &[HeaderPacket]) -> Vec<Vec<u8>> {
    packets
        .iter()
        .filter(|p| p.is_readable())
        .map(|p| p.raw().to_vec())
        .collect()
}
