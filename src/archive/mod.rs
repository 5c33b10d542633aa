mod compression;
mod format;
mod reader;
mod writer;

pub use compression::{compress_zstd, Decompressor, Passthrough, ZstdDecompressor, ZSTD_FRAME_MAGIC};
pub use format::{
    align_up, ArchiveHeader, FileEntry, Generation, LegacyEntry, NgsEntry, DICTIONARY_MAGIC,
    HEADER_SIZE, LEGACY_ENTRY_SIZE, MAGIC_NUMBER, NGS_ENTRY_SIZE, PAYLOAD_ALIGNMENT,
};
pub use reader::{ArchiveFile, ArchiveReader};
pub use writer::ArchiveWriter;
