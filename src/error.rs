use std::io;
use thiserror::Error;

/// Result type for fpk operations
pub type Result<T> = std::result::Result<T, FpkError>;

/// Unified error type for all fpk operations
#[derive(Debug, Error)]
pub enum FpkError {
    // Archive errors
    #[error("Invalid magic in archive header: expected {expected:08X}, found {found:08X}")]
    HeaderMismatch { expected: u32, found: u32 },

    #[error(
        "Truncated entry table: {entry_count} entries need {needed} bytes, only {available} available"
    )]
    TruncatedTable {
        entry_count: u32,
        needed: u64,
        available: u64,
    },

    #[error(
        "Truncated payload for {hash}: {length} bytes at offset {offset:#X} run past end of archive ({available} bytes)"
    )]
    TruncatedPayload {
        hash: String,
        offset: u64,
        length: u64,
        available: u64,
    },

    #[error("Payload offset anomaly for {hash}: starts at {offset:#X}, previous payload ends at {previous_end:#X}")]
    OffsetAnomaly {
        hash: String,
        offset: u64,
        previous_end: u64,
    },

    #[error("Duplicate entry hash in archive: {0}")]
    DuplicateHash(String),

    #[error("Archive carries more than one shared dictionary: {first} and {second}")]
    MultipleDictionaries { first: String, second: String },

    #[error("Could not determine archive generation from table layout")]
    GenerationUndetected,

    #[error("Unsupported generation: {0}")]
    UnsupportedGeneration(String),

    #[error("Archive too large: data section of {0} bytes exceeds 32-bit offsets")]
    ArchiveTooLarge(u64),

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    // Per-entry errors
    #[error("Decompression failed for {hash}: {reason}")]
    DecompressionFailed { hash: String, reason: String },

    #[error("Decompile failed: {0}")]
    DecompileFailed(String),

    // Name errors
    #[error("No file or table entry for name: {name}")]
    NameResolution { name: String },

    #[error("Malformed name table line {line_number}: {line:?}")]
    MalformedTableLine { line_number: usize, line: String },

    #[error("Invalid output name: {0}")]
    InvalidName(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<toml::de::Error> for FpkError {
    fn from(err: toml::de::Error) -> Self {
        FpkError::Config(err.to_string())
    }
}
