use crate::error::{FpkError, Result};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Magic number: "fpk\0" read as a little-endian u32 (7041126)
pub const MAGIC_NUMBER: u32 = 0x006B_7066;

/// Header size in bytes (magic, two reserved words, entry count)
pub const HEADER_SIZE: usize = 16;

/// Legacy table entry size in bytes: hash, length, offset, padding
pub const LEGACY_ENTRY_SIZE: usize = 4 * U32_SIZE;

/// NGS table entry size in bytes: 64-bit hash plus four u32 fields
pub const NGS_ENTRY_SIZE: usize = U64_SIZE + 4 * U32_SIZE;

const U32_SIZE: usize = std::mem::size_of::<u32>();
const U64_SIZE: usize = std::mem::size_of::<u64>();

/// Leading u32 of a raw zstd dictionary payload
pub const DICTIONARY_MAGIC: u32 = 0xEC30_A437;

/// Payload alignment inside the data section
pub const PAYLOAD_ALIGNMENT: u64 = 4;

/// Container generation. Selects the table entry layout and the width of
/// entry hashes; both generations share the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// 32-bit hashes, 16-byte entries, payloads stored raw
    Legacy,
    /// 64-bit FNV-1a name hashes, 24-byte entries, zstd payloads
    Ngs,
}

impl Generation {
    /// Size of one table entry
    pub fn entry_size(self) -> usize {
        match self {
            Self::Legacy => LEGACY_ENTRY_SIZE,
            Self::Ngs => NGS_ENTRY_SIZE,
        }
    }

    /// Number of hex digits used when rendering a hash of this generation
    pub fn key_width(self) -> usize {
        match self {
            Self::Legacy => 8,
            Self::Ngs => 16,
        }
    }

    /// Largest hash value an entry of this generation can carry
    pub fn max_key(self) -> u64 {
        match self {
            Self::Legacy => u32::MAX as u64,
            Self::Ngs => u64::MAX,
        }
    }

    /// Render a hash as fixed-width uppercase hex
    pub fn render_key(self, hash: u64) -> String {
        format!("{:0width$X}", hash, width = self.key_width())
    }

    /// Byte offset just past an entry table of `entry_count` rows
    pub fn table_end(self, entry_count: u32) -> u64 {
        HEADER_SIZE as u64 + entry_count as u64 * self.entry_size() as u64
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Ngs => f.write_str("ngs"),
        }
    }
}

impl FromStr for Generation {
    type Err = FpkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "fpk" => Ok(Self::Legacy),
            "ngs" => Ok(Self::Ngs),
            other => Err(FpkError::UnsupportedGeneration(other.to_string())),
        }
    }
}

/// Archive header at offset 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub magic: u32,
    pub reserved: [u32; 2],
    pub entry_count: u32,
}

impl ArchiveHeader {
    pub fn new(entry_count: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            reserved: [0, 0],
            entry_count,
        }
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.magic.to_le_bytes())?;
        writer.write_all(&self.reserved[0].to_le_bytes())?;
        writer.write_all(&self.reserved[1].to_le_bytes())?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        Ok(())
    }

    /// Read header from a reader, rejecting a wrong magic
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let magic = read_u32(&mut reader)?;
        if magic != MAGIC_NUMBER {
            return Err(FpkError::HeaderMismatch {
                expected: MAGIC_NUMBER,
                found: magic,
            });
        }

        let reserved = [read_u32(&mut reader)?, read_u32(&mut reader)?];
        let entry_count = read_u32(&mut reader)?;

        Ok(Self {
            magic,
            reserved,
            entry_count,
        })
    }
}

/// Legacy table row (16 bytes)
///
/// - Hash: uint32
/// - Length: uint32
/// - Offset: uint32 (relative to end of table)
/// - Padding: uint32 (zero on write)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyEntry {
    pub hash: u32,
    pub length: u32,
    pub offset: u32,
    pub padding: u32,
}

impl LegacyEntry {
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.hash.to_le_bytes())?;
        writer.write_all(&self.length.to_le_bytes())?;
        writer.write_all(&self.offset.to_le_bytes())?;
        writer.write_all(&self.padding.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        Ok(Self {
            hash: read_u32(&mut reader)?,
            length: read_u32(&mut reader)?,
            offset: read_u32(&mut reader)?,
            padding: read_u32(&mut reader)?,
        })
    }
}

/// NGS table row (24 bytes)
///
/// - Hash: uint64 (FNV-1a of the file name)
/// - Compressed size: uint32
/// - Offset: uint32 (relative to end of table)
/// - Uncompressed size: uint32
/// - Reserved: uint32 (zero on write)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgsEntry {
    pub hash: u64,
    pub compressed_size: u32,
    pub offset: u32,
    pub uncompressed_size: u32,
    pub reserved: u32,
}

impl NgsEntry {
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.hash.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        writer.write_all(&self.offset.to_le_bytes())?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&self.reserved.to_le_bytes())?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        Ok(Self {
            hash: read_u64(&mut reader)?,
            compressed_size: read_u32(&mut reader)?,
            offset: read_u32(&mut reader)?,
            uncompressed_size: read_u32(&mut reader)?,
            reserved: read_u32(&mut reader)?,
        })
    }
}

/// One table row, tagged with the generation it was encoded in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEntry {
    Legacy(LegacyEntry),
    Ngs(NgsEntry),
}

impl FileEntry {
    /// Build a row for `generation`; legacy hashes must fit in 32 bits
    pub fn new(
        generation: Generation,
        hash: u64,
        compressed_size: u32,
        offset: u32,
        uncompressed_size: u32,
    ) -> Result<Self> {
        match generation {
            Generation::Legacy => {
                let hash = u32::try_from(hash).map_err(|_| {
                    FpkError::UnsupportedGeneration(format!(
                        "hash {hash:016X} does not fit a legacy 32-bit key"
                    ))
                })?;
                Ok(Self::Legacy(LegacyEntry {
                    hash,
                    length: compressed_size,
                    offset,
                    padding: 0,
                }))
            }
            Generation::Ngs => Ok(Self::Ngs(NgsEntry {
                hash,
                compressed_size,
                offset,
                uncompressed_size,
                reserved: 0,
            })),
        }
    }

    pub fn read_from<R: Read>(reader: R, generation: Generation) -> Result<Self> {
        match generation {
            Generation::Legacy => LegacyEntry::read_from(reader).map(Self::Legacy),
            Generation::Ngs => NgsEntry::read_from(reader).map(Self::Ngs),
        }
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        match self {
            Self::Legacy(entry) => entry.write_to(writer),
            Self::Ngs(entry) => entry.write_to(writer),
        }
    }

    pub fn generation(&self) -> Generation {
        match self {
            Self::Legacy(_) => Generation::Legacy,
            Self::Ngs(_) => Generation::Ngs,
        }
    }

    pub fn hash(&self) -> u64 {
        match self {
            Self::Legacy(entry) => entry.hash as u64,
            Self::Ngs(entry) => entry.hash,
        }
    }

    /// Hash rendered at the generation's key width
    pub fn hash_hex(&self) -> String {
        self.generation().render_key(self.hash())
    }

    /// Stored payload length
    pub fn compressed_size(&self) -> u32 {
        match self {
            Self::Legacy(entry) => entry.length,
            Self::Ngs(entry) => entry.compressed_size,
        }
    }

    /// Payload offset relative to the end of the table
    pub fn offset(&self) -> u32 {
        match self {
            Self::Legacy(entry) => entry.offset,
            Self::Ngs(entry) => entry.offset,
        }
    }

    /// Declared decompressed length. Legacy payloads are stored raw, so this
    /// is the stored length.
    pub fn uncompressed_size(&self) -> u32 {
        match self {
            Self::Legacy(entry) => entry.length,
            Self::Ngs(entry) => entry.uncompressed_size,
        }
    }
}

/// Round `value` up to the next multiple of `alignment`
pub fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(mut reader: R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_spells_fpk() {
        assert_eq!(MAGIC_NUMBER, 7_041_126);
        assert_eq!(&MAGIC_NUMBER.to_le_bytes(), b"fpk\0");
    }

    #[test]
    fn test_header_layout() {
        let header = ArchiveHeader::new(3);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[0..4], b"fpk\0");
        assert_eq!(&buf[4..12], &[0u8; 8]);
        assert_eq!(&buf[12..16], &3u32.to_le_bytes());

        let parsed = ArchiveHeader::read_from(&buf[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_rejects_wrong_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"ICE\0");

        match ArchiveHeader::read_from(&buf[..]) {
            Err(FpkError::HeaderMismatch { expected, found }) => {
                assert_eq!(expected, MAGIC_NUMBER);
                assert_eq!(found, u32::from_le_bytes(*b"ICE\0"));
            }
            other => panic!("Expected HeaderMismatch, got: {:?}", other),
        }
    }

    #[test]
    fn test_entry_sizes() {
        let legacy = FileEntry::new(Generation::Legacy, 0xDEADBEEF, 10, 4, 10).unwrap();
        let ngs = FileEntry::new(Generation::Ngs, 0x0123_4567_89AB_CDEF, 10, 4, 99).unwrap();

        let mut buf = Vec::new();
        legacy.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), LEGACY_ENTRY_SIZE);
        assert_eq!(&buf[12..16], &[0u8; 4]);

        buf.clear();
        ngs.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), NGS_ENTRY_SIZE);
        assert_eq!(&buf[0..8], &0x0123_4567_89AB_CDEFu64.to_le_bytes());

        assert_eq!(&buf[16..20], &99u32.to_le_bytes());
        assert_eq!(&buf[20..24], &[0u8; 4]);

        let parsed = FileEntry::read_from(&buf[..], Generation::Ngs).unwrap();
        assert_eq!(parsed, ngs);
        assert_eq!(parsed.hash(), 0x0123_4567_89AB_CDEF);
        assert_eq!(parsed.uncompressed_size(), 99);
    }

    #[test]
    fn test_legacy_entry_rejects_wide_hash() {
        assert!(FileEntry::new(Generation::Legacy, 0x1_0000_0000, 0, 0, 0).is_err());
    }

    #[test]
    fn test_render_key_width() {
        assert_eq!(Generation::Legacy.render_key(0xAB), "000000AB");
        assert_eq!(Generation::Ngs.render_key(0xAB), "00000000000000AB");
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(3, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(5, 4), 8);
    }

    #[test]
    fn test_generation_from_str() {
        assert_eq!("NGS".parse::<Generation>().unwrap(), Generation::Ngs);
        assert_eq!("legacy".parse::<Generation>().unwrap(), Generation::Legacy);
        assert!("v3".parse::<Generation>().is_err());
    }
}
