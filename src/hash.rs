//! Name and content hashing
//!
//! NGS archives key every entry by a 64-bit FNV-1a hash of its file name.
//! Whole-file duplicate detection during corpus reconciliation uses
//! xxHash32 instead; those checksums never appear inside an archive.

use xxhash_rust::xxh32::xxh32;

/// FNV-1a 64-bit offset basis
pub const FNV_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;

/// FNV-1a 64-bit prime
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// FNV-1a over `name`, wrapping on overflow
pub fn hash64(name: &[u8]) -> u64 {
    name.iter()
        .fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ byte as u64).wrapping_mul(FNV_PRIME))
}

/// Hash a file name the way the game does: each UTF-16 unit that is not
/// ASCII hashes as `?`.
pub fn hash_name(name: &str) -> u64 {
    let bytes: Vec<u8> = name
        .chars()
        .flat_map(|c| {
            let (byte, units) = if c.is_ascii() {
                (c as u8, 1)
            } else {
                (b'?', c.len_utf16())
            };
            std::iter::repeat(byte).take(units)
        })
        .collect();
    hash64(&bytes)
}

/// Sixteen uppercase hex digits of `hash64(name)`: the value's
/// little-endian bytes printed last to first.
pub fn hash64_hex(name: &[u8]) -> String {
    let mut bytes = hash64(name).to_le_bytes();
    bytes.reverse();
    hex::encode_upper(bytes)
}

/// NGS table key of a file name as written to name tables: sixteen
/// uppercase hex digits of [`hash_name`]
pub fn hash_name_hex(name: &str) -> String {
    let mut bytes = hash_name(name).to_le_bytes();
    bytes.reverse();
    hex::encode_upper(bytes)
}

/// xxHash32 (seed 0) of a whole file
pub fn hash32_content(bytes: &[u8]) -> u32 {
    xxh32(bytes, 0)
}
