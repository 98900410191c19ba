use std::io::Cursor;
use std::sync::Arc;

use crypt4gh::container::{Container, ContainerError};
use crypt4gh::key::collection::KeyCollection;
use crypt4gh::key::software::SoftwareKey;
use crypt4gh::key::Key;
use crypt4gh::writer::Writer;

fn build(writer_key: &SoftwareKey, reader_pub: [u8; 32], data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut w = Writer::new(&mut bytes);
    w.add_recipient(writer_key, &reader_pub).unwrap();
    w.write_data(data).unwrap();
    w.finish().unwrap();
    bytes
}

fn open(bytes: Vec<u8>, reader: SoftwareKey, decrypt: bool) -> Container<Cursor<Vec<u8>>> {
    let collection = KeyCollection::new(vec![Arc::new(reader) as Arc<dyn Key>]).unwrap();
    Container::open(Cursor::new(bytes), collection, decrypt).unwrap()
}

#[test]
fn roundtrip_single_block() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();
    let reader_pub = reader_key.public_key();
    let bytes = build(&writer_key, reader_pub, b"hello post-genomics world");

    let mut container = open(bytes, reader_key, true);
    let blocks: Vec<_> = container.data_blocks().unwrap().collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(
        blocks[0].as_ref().unwrap().cleartext(),
        Some(b"hello post-genomics world".as_slice())
    );
}

#[test]
fn roundtrip_empty_plaintext() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();
    let reader_pub = reader_key.public_key();
    let bytes = build(&writer_key, reader_pub, b"");

    let mut container = open(bytes, reader_key, true);
    let blocks: Vec<_> = container.data_blocks().unwrap().collect();
    assert!(blocks.is_empty());
}

#[test]
fn roundtrip_spans_multiple_blocks() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();
    let reader_pub = reader_key.public_key();
    let plaintext = vec![0xABu8; 65536 + 100];
    let bytes = build(&writer_key, reader_pub, &plaintext);

    let mut container = open(bytes, reader_key, true);
    let blocks: Vec<_> = container.data_blocks().unwrap().collect();
    assert_eq!(blocks.len(), 2);
    let mut recovered = Vec::new();
    for block in blocks {
        recovered.extend_from_slice(block.unwrap().cleartext().unwrap());
    }
    assert_eq!(recovered, plaintext);
}

#[test]
fn wrong_reader_key_leaves_header_unreadable() {
    let writer_key = SoftwareKey::generate();
    let intended_reader = SoftwareKey::generate();
    let stranger = SoftwareKey::generate();
    let bytes = build(&writer_key, intended_reader.public_key(), b"for your eyes only");

    let mut container = open(bytes, stranger, true);
    let header = container.header().unwrap();
    assert_eq!(header.packet_count(), 1);
    assert_eq!(header.deks_ref().count(), 0);
}

#[test]
fn data_block_stream_is_single_use() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();
    let reader_pub = reader_key.public_key();
    let bytes = build(&writer_key, reader_pub, b"one pass only");

    let mut container = open(bytes, reader_key, true);
    let _: Vec<_> = container.data_blocks().unwrap().collect();
    assert!(matches!(
        container.data_blocks(),
        Err(ContainerError::Processed(_))
    ));
}

#[test]
fn decrypt_false_opens_without_a_usable_key() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();
    let reader_pub = reader_key.public_key();
    let bytes = build(&writer_key, reader_pub, b"opaque passthrough");

    // A container opened in opaque mode never needs the reader's key to
    // be privately capable, since nothing gets decrypted; it still must
    // satisfy KeyCollection::new's non-empty/private-capable constructor.
    let mut container = open(bytes, reader_key, false);
    let blocks: Vec<_> = container.data_blocks().unwrap().collect();
    assert_eq!(blocks.len(), 1);
    assert!(!blocks[0].as_ref().unwrap().is_deciphered());
}

#[test]
fn truncated_data_block_fails_authentication() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();
    let reader_pub = reader_key.public_key();
    let mut bytes = build(&writer_key, reader_pub, b"will be cut short");
    bytes.truncate(bytes.len() - 5);

    let mut container = open(bytes, reader_key, true);
    let blocks: Vec<_> = container.data_blocks().unwrap().collect();
    assert!(!blocks.last().unwrap().as_ref().unwrap().is_deciphered());
}

#[test]
fn severely_truncated_nonce_is_tolerated_as_eof() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();
    let reader_pub = reader_key.public_key();
    let mut bytes = build(&writer_key, reader_pub, b"will be cut very short");
    bytes.truncate(bytes.len() - 40); // cuts into the nonce itself

    let mut container = open(bytes, reader_key, true);
    let blocks: Vec<_> = container.data_blocks().unwrap().collect();
    assert!(blocks.is_empty());
}

#[test]
fn body_shorter_than_tag_is_tolerated_as_eof() {
    let writer_key = SoftwareKey::generate();
    let reader_key = SoftwareKey::generate();
    let reader_pub = reader_key.public_key();
    let mut bytes = build(&writer_key, reader_pub, b"will be cut short");
    bytes.truncate(bytes.len() - 20); // leaves < 16 bytes of body past the nonce

    let mut container = open(bytes, reader_key, true);
    let blocks: Vec<_> = container.data_blocks().unwrap().collect();
    assert!(blocks.is_empty());
}
