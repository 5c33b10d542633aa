use crate::error::{FpkError, Result};
use std::io;

/// Leading bytes of a zstd frame
pub const ZSTD_FRAME_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Turns a stored payload back into the bytes it was packed from.
///
/// One instance serves every entry of one archive, so an implementation may
/// hold per-archive state such as a shared dictionary.
pub trait Decompressor {
    fn decompress(&mut self, data: &[u8], expected_len: usize) -> io::Result<Vec<u8>>;
}

/// Legacy payloads are stored raw
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Decompressor for Passthrough {
    fn decompress(&mut self, data: &[u8], _expected_len: usize) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Zstd decompressor, optionally primed with the archive's shared dictionary
pub struct ZstdDecompressor {
    inner: zstd::bulk::Decompressor<'static>,
}

impl ZstdDecompressor {
    pub fn new(dictionary: Option<&[u8]>) -> Result<Self> {
        let inner = match dictionary {
            Some(dict) => zstd::bulk::Decompressor::with_dictionary(dict),
            None => zstd::bulk::Decompressor::new(),
        }
        .map_err(|e| FpkError::DecompressionFailed {
            hash: "<dictionary>".to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { inner })
    }
}

impl Decompressor for ZstdDecompressor {
    fn decompress(&mut self, data: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        // Entries packed without compression declare their own length
        if data.len() == expected_len && !data.starts_with(&ZSTD_FRAME_MAGIC) {
            return Ok(data.to_vec());
        }
        self.inner.decompress(data, expected_len)
    }
}

/// Compress one payload with zstd at `level`
pub fn compress_zstd(data: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::bulk::compress(data, level)
        .map_err(|e| FpkError::CompressionFailed(format!("Zstd compression failed: {}", e)))
}
