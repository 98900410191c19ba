#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

use crypt4gh::block::read_block;
use crypt4gh::header::dek::{Dek, DekCollection};

static DEK: Lazy<[u8; 32]> = Lazy::new(|| [0x11u8; 32]);

fuzz_target!(|data: &[u8]| {
    let mut deks = DekCollection::new();
    deks.add(Dek(*DEK));
    let mut stream = std::io::Cursor::new(data);
    let _ = read_block(&mut stream, Some(&mut deks), 0);
});
