//! Repacking extracted files into an archive
//!
//! The inverse of [`crate::extract`]: names are resolved back to hashes and
//! the payloads are laid out in input order, so the same input always
//! produces the same bytes.

use crate::archive::{ArchiveWriter, Generation};
use crate::error::{FpkError, Result};
use crate::extract::{is_plain_file_name, OutputLayout};
use crate::manifest::Manifest;
use crate::names::NameDatabase;
use std::path::{Path, PathBuf};
use tracing::info;

fn new_writer(generation: Generation, compression: Option<i32>) -> ArchiveWriter {
    let writer = ArchiveWriter::new(generation);
    match compression {
        Some(level) => writer.with_compression(level),
        None => writer,
    }
}

/// Pack `(name, bytes)` pairs, resolving each name through `names`. Every
/// name must be in the table.
pub fn pack_files(
    files: &[(String, Vec<u8>)],
    names: &NameDatabase,
    compression: Option<i32>,
) -> Result<ArchiveWriter> {
    let mut writer = new_writer(names.generation(), compression);

    for (name, data) in files {
        let hash = names.hash_of(name).ok_or_else(|| FpkError::NameResolution {
            name: name.clone(),
        })?;
        writer.add_file(hash, data)?;
    }

    Ok(writer)
}

/// Pack an extraction directory in manifest order. Each manifest name is
/// looked up in the known-names partition, then the unknown-names
/// partition, then `dir` itself. With `generation` unset the layout follows
/// the manifest's key width.
pub fn pack_directory(
    dir: &Path,
    manifest_path: &Path,
    generation: Option<Generation>,
    layout: &OutputLayout,
    compression: Option<i32>,
) -> Result<ArchiveWriter> {
    let manifest = Manifest::read_as(manifest_path, generation)?;
    let generation = manifest.generation();
    let mut writer = new_writer(generation, compression);

    for entry in manifest.entries() {
        if !is_plain_file_name(&entry.name) {
            return Err(FpkError::InvalidName(entry.name.clone()));
        }

        let path = locate(dir, layout, &entry.name).ok_or_else(|| FpkError::NameResolution {
            name: entry.name.clone(),
        })?;
        let data = std::fs::read(&path)?;
        writer.add_file(entry.hash, &data)?;
    }

    info!(
        dir = %dir.display(),
        entries = writer.entry_count(),
        %generation,
        "packed directory"
    );
    Ok(writer)
}

fn locate(dir: &Path, layout: &OutputLayout, name: &str) -> Option<PathBuf> {
    [
        dir.join(&layout.known_dir).join(name),
        dir.join(&layout.unknown_dir).join(name),
        dir.join(name),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Manifest written when `dir` was extracted: `x/abc_` → `x/abc.txt`
pub fn default_manifest_path(dir: &Path) -> PathBuf {
    let name = dir_name(dir);
    let stem = name.strip_suffix('_').unwrap_or(&name);
    dir.with_file_name(format!("{}.txt", stem))
}

/// Repacked archive beside `dir`: `x/abc_` → `x/abc_new.ice`
pub fn default_output_path(dir: &Path) -> PathBuf {
    dir.with_file_name(format!("{}new.ice", dir_name(dir)))
}
