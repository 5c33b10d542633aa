#![no_main]

use fpk_rs::archive::{Decompressor, ZstdDecompressor};
use fpk_rs::{ArchiveReader, Generation};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Auto-detection and both forced layouts must reject garbage without
    // panicking
    for generation in [None, Some(Generation::Legacy), Some(Generation::Ngs)] {
        let reader = match ArchiveReader::from_bytes(data.to_vec(), generation) {
            Ok(r) => r,
            Err(_) => continue,
        };

        for file in reader.files() {
            let _ = file.entry.hash_hex();
            let _ = reader.find(file.entry.hash());
        }

        if reader.generation() == Generation::Ngs {
            let mut decompressor = match ZstdDecompressor::new(reader.dictionary()) {
                Ok(d) => d,
                Err(_) => continue,
            };
            for file in reader.files() {
                // Cap the claimed size so a hostile table cannot force a
                // huge allocation
                let expected = (file.entry.uncompressed_size() as usize).min(1 << 20);
                let _ = decompressor.decompress(file.data, expected);
            }
        }
    }
});
