//! Known-answer / wire-structure tests against the fixed container layout.

use crypt4gh::key::software::SoftwareKey;
use crypt4gh::key::Key;
use crypt4gh::wire::{MAGIC, NONCE_BYTES, TAG_BYTES, VERSION, X25519_KEY_BYTES};
use crypt4gh::writer::Writer;

#[test]
fn wire_constants_match_the_crypt4gh_v1_layout() {
    assert_eq!(MAGIC, b"crypt4gh");
    assert_eq!(VERSION, 1);
    assert_eq!(X25519_KEY_BYTES, 32);
    assert_eq!(NONCE_BYTES, 12);
    assert_eq!(TAG_BYTES, 16);
}

#[test]
fn preamble_bytes_are_literal() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();

    let mut bytes = Vec::new();
    let mut w = Writer::new(&mut bytes);
    w.add_recipient(&writer_key, &reader_key.public_key()).unwrap();
    w.write_data(b"kat").unwrap();
    w.finish().unwrap();

    assert_eq!(&bytes[0..8], b"crypt4gh");
    assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 1);
    assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 1); // one packet
}

#[test]
fn header_packet_carries_the_writer_public_key_verbatim() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();

    let mut bytes = Vec::new();
    let mut w = Writer::new(&mut bytes);
    w.add_recipient(&writer_key, &reader_key.public_key()).unwrap();
    w.write_data(b"kat").unwrap();
    w.finish().unwrap();

    // preamble(16) + packet_length(4) + method(4) = offset 24 for the writer pubkey.
    let packet_writer_pub = &bytes[24..56];
    assert_eq!(packet_writer_pub, &writer_key.public_key());
}

#[test]
fn data_block_size_is_cleartext_length_plus_fixed_overhead() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();

    let mut bytes = Vec::new();
    let mut w = Writer::new(&mut bytes);
    w.add_recipient(&writer_key, &reader_key.public_key()).unwrap();
    w.write_data(b"0123456789").unwrap();
    w.finish().unwrap();

    // After the header packet, the remaining bytes are exactly one data
    // block: nonce + 10-byte ciphertext + tag.
    let block_bytes = bytes.len()
        - 16 // preamble
        - {
            let packet_length = u32::from_le_bytes(bytes[16..20].try_into().unwrap()) as usize;
            packet_length
        };
    assert_eq!(block_bytes, NONCE_BYTES + 10 + TAG_BYTES);
}
