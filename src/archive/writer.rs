use crate::archive::compression::compress_zstd;
use crate::archive::format::{align_up, ArchiveHeader, FileEntry, Generation, PAYLOAD_ALIGNMENT};
use crate::error::{FpkError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// A payload waiting to be laid out
struct PendingFile {
    hash: u64,
    payload: Vec<u8>,
    uncompressed_size: u32,
}

/// Builds an FPK container in memory.
///
/// Entries are laid out in the order they are added. Each payload offset is
/// the previous payload's end rounded up to a multiple of 4; the zero padding
/// lives between payloads only, the last payload is left unpadded.
pub struct ArchiveWriter {
    generation: Generation,
    compression_level: Option<i32>,
    files: Vec<PendingFile>,
    hashes: HashSet<u64>,
}

impl ArchiveWriter {
    /// Create an empty archive of the given generation. Payloads are stored
    /// verbatim.
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            compression_level: None,
            files: Vec::new(),
            hashes: HashSet::new(),
        }
    }

    /// Compress NGS payloads with zstd at `level`. Legacy archives have no
    /// compression step and ignore this.
    pub fn with_compression(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> usize {
        self.files.len()
    }

    /// Add a payload under `hash`
    pub fn add_file(&mut self, hash: u64, data: &[u8]) -> Result<()> {
        self.check_hash(hash)?;

        let uncompressed_size = u32::try_from(data.len())
            .map_err(|_| FpkError::ArchiveTooLarge(data.len() as u64))?;

        let payload = match (self.generation, self.compression_level) {
            (Generation::Ngs, Some(level)) => compress_zstd(data, level)?,
            _ => data.to_vec(),
        };

        self.push(hash, payload, uncompressed_size);
        Ok(())
    }

    /// Add bytes that are already in their stored form, such as a zstd frame
    /// compressed against the archive's dictionary or the dictionary itself.
    /// Legacy rows have no uncompressed size and ignore it.
    pub fn add_stored(&mut self, hash: u64, stored: &[u8], uncompressed_size: u32) -> Result<()> {
        self.check_hash(hash)?;
        if u32::try_from(stored.len()).is_err() {
            return Err(FpkError::ArchiveTooLarge(stored.len() as u64));
        }

        self.push(hash, stored.to_vec(), uncompressed_size);
        Ok(())
    }

    fn check_hash(&self, hash: u64) -> Result<()> {
        if hash > self.generation.max_key() {
            return Err(FpkError::UnsupportedGeneration(format!(
                "hash {hash:016X} does not fit a {} key",
                self.generation
            )));
        }
        if self.hashes.contains(&hash) {
            return Err(FpkError::DuplicateHash(self.generation.render_key(hash)));
        }
        Ok(())
    }

    fn push(&mut self, hash: u64, payload: Vec<u8>, uncompressed_size: u32) {
        debug!(
            hash = %self.generation.render_key(hash),
            stored = payload.len(),
            uncompressed = uncompressed_size,
            "queued entry"
        );

        self.hashes.insert(hash);
        self.files.push(PendingFile {
            hash,
            payload,
            uncompressed_size,
        });
    }

    /// Compute the table rows for the queued payloads
    pub fn layout(&self) -> Result<Vec<FileEntry>> {
        let mut offset = 0u64;
        let mut entries = Vec::with_capacity(self.files.len());

        for file in &self.files {
            let entry_offset =
                u32::try_from(offset).map_err(|_| FpkError::ArchiveTooLarge(offset))?;
            entries.push(FileEntry::new(
                self.generation,
                file.hash,
                file.payload.len() as u32,
                entry_offset,
                file.uncompressed_size,
            )?);

            offset = align_up(offset + file.payload.len() as u64, PAYLOAD_ALIGNMENT);
        }

        Ok(entries)
    }

    /// Serialize header, table and payloads
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<u64> {
        let entries = self.layout()?;
        let count = u32::try_from(entries.len())
            .map_err(|_| FpkError::ArchiveTooLarge(entries.len() as u64))?;

        ArchiveHeader::new(count).write_to(&mut writer)?;
        for entry in &entries {
            entry.write_to(&mut writer)?;
        }

        // The table is a multiple of 4 bytes, so payload-relative padding
        // matches the absolute file position.
        let mut written = self.generation.table_end(count);
        let last = self.files.len().saturating_sub(1);
        for (index, file) in self.files.iter().enumerate() {
            writer.write_all(&file.payload)?;
            written += file.payload.len() as u64;

            if index < last {
                let padding = align_up(written, PAYLOAD_ALIGNMENT) - written;
                writer.write_all(&[0u8; PAYLOAD_ALIGNMENT as usize][..padding as usize])?;
                written += padding;
            }
        }

        Ok(written)
    }

    /// Serialize into a byte vector
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write the archive to `path`, replacing any existing file
    pub fn finalize<P: AsRef<Path>>(self, path: P) -> Result<u64> {
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(written)
    }
}
