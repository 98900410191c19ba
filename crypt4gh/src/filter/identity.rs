//! The no-op filter.

use crate::header::packet::HeaderPacket;

/// Returns every packet's raw bytes unchanged, in their original order.
///
/// Data blocks are never touched by any filter in this module, so there
/// is nothing for the identity filter to do to them either — callers
/// pass the original block stream straight through to
/// [`crate::writer::write_container`].
pub fn identity(packets: &[HeaderPacket]) -> Vec<Vec<u8>> {
    packets.iter().map(|p| p.raw().to_vec()).collect()
}
