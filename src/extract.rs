//! Archive extraction
//!
//! Unpacks every application file of an archive into
//! `<archive_dir>/<archive_stem>_/`, naming each one through the
//! [`NameDatabase`]. Entries with a known name go under `KnownNames/`, the
//! rest are named by hash under `UnknownNames/`. A manifest of what was
//! written lands in `<archive_dir>/<archive_stem>.txt`.
//!
//! A payload that fails to decompress or decompile is written as the bytes
//! of the last stage that succeeded and recorded in the [`ExtractReport`];
//! it never aborts the rest of the archive.

use crate::archive::{
    ArchiveFile, ArchiveReader, Decompressor, Generation, Passthrough, ZstdDecompressor,
};
use crate::config::ToolConfig;
use crate::error::{FpkError, Result};
use crate::manifest::Manifest;
use crate::names::NameDatabase;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Turns script bytecode into readable text
pub trait Decompiler {
    fn decompile(&self, bytecode: &[u8]) -> Result<String>;
}

/// Directory and naming conventions for extracted files
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub known_dir: String,
    pub unknown_dir: String,
    pub unknown_extension: String,
}

impl OutputLayout {
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            known_dir: config.known_names_dir.clone(),
            unknown_dir: config.unknown_names_dir.clone(),
            unknown_extension: config.unknown_extension.clone(),
        }
    }

    /// File name for an entry the database does not know
    pub fn unknown_name(&self, hash: u64, generation: Generation) -> String {
        format!("{}.{}", generation.render_key(hash), self.unknown_extension)
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::from_config(&ToolConfig::default())
    }
}

/// Summary of one extraction
#[derive(Debug, Clone, Serialize)]
pub struct ExtractReport {
    pub generation: Generation,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub extracted: usize,
    pub known: usize,
    pub unknown: usize,
    /// Hash of the shared dictionary entry, if any
    pub dictionary: Option<String>,
    /// Entries written as their stored bytes
    pub decompression_failures: Vec<String>,
    /// Entries written as decompressed bytecode
    pub decompile_failures: Vec<String>,
}

/// Output directory and manifest path for an archive:
/// `data/win32/abc` → (`data/win32/abc_`, `data/win32/abc.txt`)
pub fn output_paths(archive_path: &Path) -> (PathBuf, PathBuf) {
    let parent = archive_path.parent().unwrap_or_else(|| Path::new(""));
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (
        parent.join(format!("{}_", stem)),
        parent.join(format!("{}.txt", stem)),
    )
}

/// A database name is used as an output file name only if it cannot escape
/// the output directory.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Extracts archives using one name database
pub struct Extractor<'a> {
    names: &'a NameDatabase,
    layout: OutputLayout,
    decompiler: Option<&'a dyn Decompiler>,
}

impl<'a> Extractor<'a> {
    pub fn new(names: &'a NameDatabase, layout: OutputLayout) -> Self {
        Self {
            names,
            layout,
            decompiler: None,
        }
    }

    /// Decompile every successfully decompressed payload
    pub fn with_decompiler(mut self, decompiler: &'a dyn Decompiler) -> Self {
        self.decompiler = Some(decompiler);
        self
    }

    /// Open `archive_path` and extract it next to itself
    pub fn extract_archive<P: AsRef<Path>>(
        &self,
        archive_path: P,
        generation: Option<Generation>,
    ) -> Result<ExtractReport> {
        let archive_path = archive_path.as_ref();
        let reader = ArchiveReader::open(archive_path, generation)?;
        let (output_dir, manifest_path) = output_paths(archive_path);
        self.extract(&reader, &output_dir, &manifest_path)
    }

    /// Extract a parsed archive into `output_dir`
    pub fn extract(
        &self,
        reader: &ArchiveReader,
        output_dir: &Path,
        manifest_path: &Path,
    ) -> Result<ExtractReport> {
        let generation = reader.generation();
        if generation != self.names.generation() {
            return Err(FpkError::UnsupportedGeneration(format!(
                "{} name table cannot name entries of a {} archive",
                self.names.generation(),
                generation
            )));
        }

        let known_dir = output_dir.join(&self.layout.known_dir);
        let unknown_dir = output_dir.join(&self.layout.unknown_dir);
        fs::create_dir_all(&known_dir)?;
        fs::create_dir_all(&unknown_dir)?;

        let mut decompressor: Box<dyn Decompressor> = match generation {
            Generation::Legacy => Box::new(Passthrough),
            Generation::Ngs => Box::new(ngs_decompressor(reader)?),
        };

        let mut report = ExtractReport {
            generation,
            output_dir: output_dir.to_path_buf(),
            manifest_path: manifest_path.to_path_buf(),
            extracted: 0,
            known: 0,
            unknown: 0,
            dictionary: reader.dictionary_hash().map(|hash| generation.render_key(hash)),
            decompression_failures: Vec::new(),
            decompile_failures: Vec::new(),
        };
        let mut manifest = Manifest::new(generation);

        for file in reader.files() {
            let hash = file.entry.hash();
            let (name, target) = match self.known_name(hash) {
                Some(name) => {
                    report.known += 1;
                    (name.to_string(), known_dir.join(name))
                }
                None => {
                    report.unknown += 1;
                    let name = self.layout.unknown_name(hash, generation);
                    let target = unknown_dir.join(&name);
                    (name, target)
                }
            };

            let contents = self.decode(file, decompressor.as_mut(), &mut report);
            fs::write(&target, contents)?;

            manifest.push(hash, name);
            report.extracted += 1;
        }

        manifest.write(manifest_path)?;

        info!(
            output = %output_dir.display(),
            extracted = report.extracted,
            known = report.known,
            unknown = report.unknown,
            decompression_failures = report.decompression_failures.len(),
            decompile_failures = report.decompile_failures.len(),
            "extracted archive"
        );

        Ok(report)
    }

    fn known_name(&self, hash: u64) -> Option<&'a str> {
        let name = self.names.lookup(hash)?;
        if is_plain_file_name(name) {
            Some(name)
        } else {
            warn!(
                hash = %self.names.generation().render_key(hash),
                table_name = name,
                "name table entry is not a plain file name, using hash instead"
            );
            None
        }
    }

    /// Decompress then decompile, falling back to the last good stage
    fn decode(
        &self,
        file: ArchiveFile<'_>,
        decompressor: &mut dyn Decompressor,
        report: &mut ExtractReport,
    ) -> Vec<u8> {
        let hash = file.entry.hash_hex();
        let expected = file.entry.uncompressed_size() as usize;

        let raw = match decompressor.decompress(file.data, expected) {
            Ok(raw) => raw,
            Err(err) => {
                let err = FpkError::DecompressionFailed {
                    hash: hash.clone(),
                    reason: err.to_string(),
                };
                warn!(error = %err, "keeping stored bytes");
                report.decompression_failures.push(hash);
                return file.data.to_vec();
            }
        };

        let Some(decompiler) = self.decompiler else {
            return raw;
        };

        match decompiler.decompile(&raw) {
            Ok(text) => text.into_bytes(),
            Err(err) => {
                warn!(hash = %hash, error = %err, "keeping bytecode");
                report.decompile_failures.push(hash);
                raw
            }
        }
    }
}

/// Zstd decompressor primed with the archive's dictionary. A dictionary
/// zstd refuses to load is logged and extraction carries on without it.
fn ngs_decompressor(reader: &ArchiveReader) -> Result<ZstdDecompressor> {
    let Some(dictionary) = reader.dictionary() else {
        return ZstdDecompressor::new(None);
    };

    ZstdDecompressor::new(Some(dictionary)).or_else(|err| {
        warn!(error = %err, "shared dictionary rejected, decompressing without it");
        ZstdDecompressor::new(None)
    })
}
