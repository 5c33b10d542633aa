//! fpk-rs: reader and writer for FPK/ICE game archives
//!
//! An archive is a 16-byte header, a table of fixed-size entries keyed by
//! name hash, and a packed payload region. Two table layouts exist:
//! - Legacy: 32-bit hashes, payloads stored verbatim
//! - NGS: 64-bit FNV-1a hashes, payloads optionally zstd-compressed against
//!   a shared dictionary carried as an ordinary entry
//!
//! Names are not stored in the archive. A sidecar [`NameDatabase`] maps
//! hashes back to names for extraction and names to hashes for packing.
//!
//! # Example
//!
//! ```no_run
//! use fpk_rs::{ArchiveReader, ArchiveWriter, Generation, NameDatabase};
//!
//! let mut writer = ArchiveWriter::new(Generation::Ngs);
//! writer.add_file(fpk_rs::hash::hash_name("boot.lua"), b"print(1)")?;
//! writer.finalize("boot.ice")?;
//!
//! let reader = ArchiveReader::open("boot.ice", None)?;
//! let names = NameDatabase::load_from_path("FpkToolNGS.txt", reader.generation())?;
//! for file in reader.files() {
//!     println!("{:?} {}", names.lookup(file.entry.hash()), file.data.len());
//! }
//! # Ok::<(), fpk_rs::FpkError>(())
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod hash;
pub mod manifest;
pub mod names;
pub mod pack;
pub mod reconcile;
pub mod rip;

pub use archive::{
    ArchiveFile, ArchiveHeader, ArchiveReader, ArchiveWriter, FileEntry, Generation, HEADER_SIZE,
    LEGACY_ENTRY_SIZE, MAGIC_NUMBER, NGS_ENTRY_SIZE,
};
pub use config::ToolConfig;
pub use error::{FpkError, Result};
pub use extract::{Decompiler, ExtractReport, Extractor, OutputLayout};
pub use manifest::{Manifest, ManifestEntry};
pub use names::{LoadPolicy, NameDatabase, NameRecord};
pub use reconcile::{Association, ChecksumIndex};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        let writer = ArchiveWriter::new(Generation::Legacy);
        assert_eq!(writer.entry_count(), 0);
        assert_eq!(ArchiveHeader::new(3).entry_count, 3);
    }
}
