//! Harvest script names from decompiled sources
//!
//! Decompiled scripts mention the files they load (`require "ui/menu.lua"`).
//! Hashing those bare file names recovers table entries for archives that
//! were extracted before the names were known.

use crate::archive::Generation;
use crate::error::{FpkError, Result};
use crate::hash::hash_name;
use crate::names::NameDatabase;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCRIPT_SUFFIX: &str = ".lua";

/// Script file names referenced by `text`, one candidate per matching line
pub fn names_in_text(text: &str) -> Vec<String> {
    text.lines().filter_map(name_in_line).collect()
}

/// Last quoted chunk mentioning a script, reduced to its final path
/// component.
fn name_in_line(line: &str) -> Option<String> {
    if !line.contains(SCRIPT_SUFFIX) {
        return None;
    }

    let chunk = last_containing(line.split('"'))?;
    let chunk = last_containing(chunk.split('/'))?;
    let name = last_containing(chunk.split('\\'))?;

    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }
    Some(name.to_string())
}

fn last_containing<'a>(parts: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    parts.filter(|part| part.contains(SCRIPT_SUFFIX)).last()
}

/// Scan `dir` recursively for files ending in `.{extension}` and add every
/// referenced script name to `names`. Returns how many names were new.
pub fn rip_directory(dir: &Path, extension: &str, names: &mut NameDatabase) -> Result<usize> {
    if names.generation() != Generation::Ngs {
        return Err(FpkError::UnsupportedGeneration(format!(
            "name ripping produces 64-bit keys, table is {}",
            names.generation()
        )));
    }

    let mut files = Vec::new();
    collect_files(dir, extension, &mut files)?;

    let mut added = 0;
    for path in &files {
        let text = String::from_utf8_lossy(&fs::read(path)?).into_owned();
        for name in names_in_text(&text) {
            if names.insert_if_absent(hash_name(&name), name.as_str()) {
                debug!(name = %name, source = %path.display(), "new name");
                added += 1;
            }
        }
    }

    info!(dir = %dir.display(), files = files.len(), added, "ripped script names");
    Ok(added)
}

fn collect_files(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_files(&path, extension, out)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            out.push(path);
        }
    }
    Ok(())
}
