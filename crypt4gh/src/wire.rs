//! Wire-format constants for the Crypt4GH v1 container.
//!
//! Multi-byte integers are little-endian except where noted. This module
//! holds only the sizes and magic bytes; parsing/serialization live in
//! [`crate::header`], [`crate::block`] and [`crate::writer`].

/// 8-byte container magic.
pub const MAGIC: &[u8; 8] = b"crypt4gh";

/// The only supported container version.
pub const VERSION: u32 = 1;

/// X25519 key size (public or private scalar).
pub const X25519_KEY_BYTES: usize = 32;

/// ChaCha20-Poly1305 (IETF) nonce size.
pub const NONCE_BYTES: usize = 12;

/// ChaCha20-Poly1305 (IETF) authentication tag size.
pub const TAG_BYTES: usize = 16;

/// Data Encryption Key size.
pub const DEK_BYTES: usize = 32;

/// Fixed header-packet preamble: length(4) + method(4) + writer_pk(32) + nonce(12).
pub const PACKET_PREAMBLE_BYTES: usize = 4 + 4 + X25519_KEY_BYTES + NONCE_BYTES;

/// Minimum possible header packet size: preamble + tag (empty sealed payload).
pub const MIN_PACKET_BYTES: usize = PACKET_PREAMBLE_BYTES + TAG_BYTES;

/// Maximum cleartext size of a single data block.
pub const MAX_BLOCK_CLEARTEXT_BYTES: usize = 65536;

/// On-wire size of a maximum-size data block: nonce + ciphertext + tag.
pub const MAX_BLOCK_WIRE_BYTES: usize = NONCE_BYTES + MAX_BLOCK_CLEARTEXT_BYTES + TAG_BYTES;

/// Packet type: data-encryption-parameters (a DEK).
pub const PACKET_TYPE_DATA_ENCRYPTION_PARAMETERS: u32 = 0;

/// Packet type: edit list.
pub const PACKET_TYPE_EDIT_LIST: u32 = 1;

/// The only supported header-packet encryption method and
/// data-encryption method (both field position 0 means ChaCha20-Poly1305).
pub const METHOD_CHACHA20_IETF_POLY1305: u32 = 0;

/// X25519 base point (the Montgomery `u`-coordinate generator): byte 0 is
/// `9`, the rest are zero.
pub const X25519_BASEPOINT_BYTES: [u8; 32] = {
    let mut b = [0u8; 32];
    b[0] = 9;
    b
};
