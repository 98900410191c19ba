#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crypt4gh::header::Header;
use crypt4gh::key::collection::KeyCollection;
use crypt4gh::key::software::SoftwareKey;
use crypt4gh::key::Key;

static READER: Lazy<SoftwareKey> = Lazy::new(SoftwareKey::generate);

fuzz_target!(|data: &[u8]| {
    let mut stream = std::io::Cursor::new(data);
    let Ok(mut header) = Header::parse(&mut stream) else {
        return;
    };
    if header.packet_count() > 4096 {
        return;
    }
    let mut collection =
        KeyCollection::new(vec![Arc::new(READER.clone()) as Arc<dyn Key>]).unwrap();
    let _ = header.load_packets(&mut stream, &mut collection);
});
