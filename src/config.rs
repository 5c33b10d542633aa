//! Tool configuration
//!
//! Every path the tool reads or writes by default is named here instead of
//! being derived from the executable's location. A config file is optional;
//! missing keys take their defaults.
//!
//! ```toml
//! names_table = "tables/FpkToolNGS.txt"
//! unknown_extension = "luac"
//! ngs_compression_level = 6
//! ```

use crate::archive::Generation;
use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Sidecar table for NGS (64-bit) archives
    pub names_table: PathBuf,
    /// Sidecar table for legacy (32-bit) archives
    pub legacy_names_table: PathBuf,
    /// Association list written by corpus reconciliation
    pub reconcile_output: PathBuf,
    /// Extension given to entries with no known name
    pub unknown_extension: String,
    /// Output partition for entries with a known name
    pub known_names_dir: String,
    /// Output partition for entries named by hash
    pub unknown_names_dir: String,
    /// Extension of decompiled scripts scanned when ripping names
    pub rip_extension: String,
    /// Zstd level for NGS packing; `None` stores payloads verbatim
    pub ngs_compression_level: Option<i32>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            names_table: PathBuf::from("FpkToolNGS.txt"),
            legacy_names_table: PathBuf::from("FpkTool.txt"),
            reconcile_output: PathBuf::from("FpkTool_Named.txt"),
            unknown_extension: "lua".to_string(),
            known_names_dir: "KnownNames".to_string(),
            unknown_names_dir: "UnknownNames".to_string(),
            rip_extension: "decomplua".to_string(),
            ngs_compression_level: None,
        }
    }
}

impl ToolConfig {
    /// Load from a TOML file; a missing file gives the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Sidecar table matching an archive generation
    pub fn names_table_for(&self, generation: Generation) -> &Path {
        match generation {
            Generation::Legacy => &self.legacy_names_table,
            Generation::Ngs => &self.names_table,
        }
    }
}
