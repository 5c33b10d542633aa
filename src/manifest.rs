//! Per-archive extraction manifest
//!
//! Extraction writes `<archive_stem>.txt` beside the archive, one
//! `<hex-hash>  <name>` line per extracted entry in table order. Packing
//! reads it back to recover both the hashes and the entry order.
//!
//! ```text
//! 6943297F78F0FD83  npc_talk.lua
//! 00000000DEADBEEF  00000000DEADBEEF.lua
//! ```

use crate::archive::Generation;
use crate::error::{FpkError, Result};
use std::path::Path;

/// One extracted entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub hash: u64,
    pub name: String,
}

/// Ordered list of extracted entries
#[derive(Debug, Clone)]
pub struct Manifest {
    generation: Generation,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, hash: u64, name: impl Into<String>) {
        self.entries.push(ManifestEntry {
            hash,
            name: name.into(),
        });
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Manifest text with two spaces between hash and name
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&self.generation.render_key(entry.hash));
            out.push_str("  ");
            out.push_str(&entry.name);
            out.push('\n');
        }
        out
    }

    /// Parse manifest text. Any run of spaces separates hash from name, so
    /// single-space tables written by older tools load too.
    pub fn parse(text: &str, generation: Generation) -> Result<Self> {
        let mut manifest = Self::new(generation);

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let malformed = || FpkError::MalformedTableLine {
                line_number: index + 1,
                line: line.to_string(),
            };

            let (key, rest) = line.split_once(' ').ok_or_else(malformed)?;
            let name = rest.trim_start_matches(' ');
            if key.is_empty()
                || key.len() > generation.key_width()
                || !key.bytes().all(|b| b.is_ascii_hexdigit())
                || name.is_empty()
            {
                return Err(malformed());
            }
            let hash = u64::from_str_radix(key, 16).map_err(|_| malformed())?;

            manifest.push(hash, name);
        }

        Ok(manifest)
    }

    /// Generation whose key width matches the first entry: 8 hex digits for
    /// legacy, 16 for NGS. Manifests written by extraction always pad keys
    /// to full width.
    pub fn infer_generation(text: &str) -> Option<Generation> {
        let line = text.lines().find(|line| !line.trim().is_empty())?;
        let (key, _) = line.split_once(' ')?;
        [Generation::Legacy, Generation::Ngs]
            .into_iter()
            .find(|generation| generation.key_width() == key.len())
    }

    /// Read a manifest, taking the generation from its keys when `generation`
    /// is `None`
    pub fn read_as<P: AsRef<Path>>(path: P, generation: Option<Generation>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let generation = match generation {
            Some(generation) => generation,
            None => Self::infer_generation(&text).ok_or(FpkError::GenerationUndetected)?,
        };
        Self::parse(&text, generation)
    }

    pub fn read<P: AsRef<Path>>(path: P, generation: Generation) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, generation)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}
