//! Hash → file name database
//!
//! Archives store hashes only, so extracted files get their names from a
//! sidecar table of `<hex-hash> <name>` lines. The table is loaded once,
//! extended in memory (name ripping, extraction) and written back to a *new*
//! file next to the original.
//!
//! # Example
//!
//! ```
//! use fpk_rs::{Generation, NameDatabase};
//!
//! let mut db = NameDatabase::load("AF63DC4C8601EC8C a\n", Generation::Ngs)?;
//! assert_eq!(db.lookup(0xAF63DC4C8601EC8C), Some("a"));
//!
//! assert!(!db.insert_if_absent(0xAF63DC4C8601EC8C, "b"));
//! assert_eq!(db.serialize(), "AF63DC4C8601EC8C a\n");
//! # Ok::<(), fpk_rs::FpkError>(())
//! ```

use crate::archive::Generation;
use crate::error::{FpkError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One `(hash, name)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub hash: u64,
    pub name: String,
}

/// What to do with a line that does not parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Fail on the first malformed line
    #[default]
    Abort,
    /// Log and skip malformed lines
    Skip,
}

/// Hash-keyed name table. The first record seen for a hash wins.
#[derive(Debug, Clone)]
pub struct NameDatabase {
    generation: Generation,
    records: Vec<NameRecord>,
    by_hash: HashMap<u64, usize>,
    by_name: HashMap<String, usize>,
}

impl NameDatabase {
    /// Create an empty database for the given key width
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            records: Vec::new(),
            by_hash: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Parse table text, aborting on the first malformed line
    pub fn load(text: &str, generation: Generation) -> Result<Self> {
        Self::load_with(text, generation, LoadPolicy::Abort)
    }

    /// Parse table text with an explicit policy for malformed lines
    pub fn load_with(text: &str, generation: Generation, policy: LoadPolicy) -> Result<Self> {
        let mut db = Self::new(generation);

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(line, index + 1, generation) {
                Ok(record) => {
                    db.insert_if_absent(record.hash, record.name);
                }
                Err(err) if policy == LoadPolicy::Skip => {
                    warn!(error = %err, "skipping name table line");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(db)
    }

    /// Load a table file. A missing file gives an empty database.
    pub fn load_from_path<P: AsRef<Path>>(path: P, generation: Generation) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "name table does not exist, starting empty");
            return Ok(Self::new(generation));
        }

        let text = std::fs::read_to_string(path)?;
        let db = Self::load(&text, generation)?;
        info!(path = %path.display(), names = db.len(), "loaded name table");
        Ok(db)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Name recorded for `hash`
    pub fn lookup(&self, hash: u64) -> Option<&str> {
        self.by_hash
            .get(&hash)
            .map(|&index| self.records[index].name.as_str())
    }

    /// Hash recorded for `name` (first record wins)
    pub fn hash_of(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).map(|&index| self.records[index].hash)
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.by_hash.contains_key(&hash)
    }

    /// Add `name` under `hash` unless the hash is already known. Returns
    /// whether the record was added.
    pub fn insert_if_absent(&mut self, hash: u64, name: impl Into<String>) -> bool {
        if self.by_hash.contains_key(&hash) {
            return false;
        }

        let name = name.into();
        let index = self.records.len();
        self.by_hash.insert(hash, index);
        self.by_name.entry(name.clone()).or_insert(index);
        self.records.push(NameRecord { hash, name });
        true
    }

    /// Records in load/insertion order
    pub fn iter(&self) -> impl Iterator<Item = &NameRecord> {
        self.records.iter()
    }

    /// Table text, one line per record, ordered by name
    pub fn serialize(&self) -> String {
        let mut sorted: Vec<&NameRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name).then(a.hash.cmp(&b.hash)));

        let mut out = String::new();
        for record in sorted {
            out.push_str(&self.generation.render_key(record.hash));
            out.push(' ');
            out.push_str(&record.name);
            out.push('\n');
        }
        out
    }

    /// Write the table next to `source` as `<stem>_new.<ext>`; `source`
    /// itself is never touched. Returns the path written.
    pub fn save_new<P: AsRef<Path>>(&self, source: P) -> Result<PathBuf> {
        let target = new_table_path(source.as_ref());
        std::fs::write(&target, self.serialize())?;
        info!(path = %target.display(), names = self.len(), "wrote name table");
        Ok(target)
    }
}

/// `dir/FpkToolNGS.txt` → `dir/FpkToolNGS_new.txt`
pub fn new_table_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{}_new.{}", stem, ext.to_string_lossy()),
        None => format!("{}_new", stem),
    };
    source.with_file_name(file_name)
}

/// `<hex> <name>`: the name is everything after the first space
fn parse_line(line: &str, line_number: usize, generation: Generation) -> Result<NameRecord> {
    let malformed = || FpkError::MalformedTableLine {
        line_number,
        line: line.to_string(),
    };

    let (key, name) = line.split_once(' ').ok_or_else(malformed)?;
    if key.is_empty()
        || key.len() > generation.key_width()
        || !key.bytes().all(|b| b.is_ascii_hexdigit())
        || name.is_empty()
    {
        return Err(malformed());
    }

    let hash = u64::from_str_radix(key, 16).map_err(|_| malformed())?;
    Ok(NameRecord {
        hash,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_wins() {
        let text = "00000000000000AA first.lua\n00000000000000AA second.lua\n";
        let db = NameDatabase::load(text, Generation::Ngs).unwrap();

        assert_eq!(db.len(), 1);
        assert_eq!(db.lookup(0xAA), Some("first.lua"));
    }

    #[test]
    fn test_name_keeps_spaces() {
        let db = NameDatabase::load("0000ABCD my file.lua", Generation::Legacy).unwrap();
        assert_eq!(db.lookup(0xABCD), Some("my file.lua"));
        assert_eq!(db.hash_of("my file.lua"), Some(0xABCD));
    }

    #[test]
    fn test_malformed_lines() {
        for bad in ["nospace", "XYZ name.lua", " name.lua", "0011223344556677889 long.lua", "AB "] {
            let text = format!("00000001 ok.lua\n{}\n", bad);
            match NameDatabase::load(&text, Generation::Ngs) {
                Err(FpkError::MalformedTableLine { line_number, line }) => {
                    assert_eq!(line_number, 2);
                    assert_eq!(line, bad);
                }
                other => panic!("Expected MalformedTableLine for {:?}, got: {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_legacy_key_width() {
        assert!(NameDatabase::load("123456789 wide.lua", Generation::Legacy).is_err());
        assert!(NameDatabase::load("FFFFFFFF ok.lua", Generation::Legacy).is_ok());
    }

    #[test]
    fn test_skip_policy() {
        let text = "garbage\n0000000000000001 one.lua\n";
        let db = NameDatabase::load_with(text, Generation::Ngs, LoadPolicy::Skip).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db.lookup(1), Some("one.lua"));
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let text = "0000000000000001 one.lua\r\n\r\n0000000000000002 two.lua\r\n";
        let db = NameDatabase::load(text, Generation::Ngs).unwrap();
        assert_eq!(db.lookup(1), Some("one.lua"));
        assert_eq!(db.lookup(2), Some("two.lua"));
    }

    #[test]
    fn test_insert_if_absent_never_clobbers() {
        let mut db = NameDatabase::new(Generation::Ngs);
        assert!(db.insert_if_absent(5, "kept.lua"));
        assert!(!db.insert_if_absent(5, "other.lua"));
        assert_eq!(db.lookup(5), Some("kept.lua"));
        assert!(db.contains(5));
        assert!(!db.contains(6));
    }

    #[test]
    fn test_serialize_sorted_by_name() {
        let mut db = NameDatabase::new(Generation::Ngs);
        db.insert_if_absent(0x1, "zeta.lua");
        db.insert_if_absent(0xFFFF, "alpha.lua");
        db.insert_if_absent(0x20, "mid.lua");

        assert_eq!(
            db.serialize(),
            "000000000000FFFF alpha.lua\n0000000000000020 mid.lua\n0000000000000001 zeta.lua\n"
        );

        let reloaded = NameDatabase::load(&db.serialize(), Generation::Ngs).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.lookup(0x20), Some("mid.lua"));
    }

    #[test]
    fn test_save_new_leaves_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("FpkToolNGS.txt");
        std::fs::write(&source, "0000000000000001 one.lua\n").unwrap();

        let mut db = NameDatabase::load_from_path(&source, Generation::Ngs).unwrap();
        db.insert_if_absent(2, "two.lua");
        let written = db.save_new(&source).unwrap();

        assert_eq!(written, dir.path().join("FpkToolNGS_new.txt"));
        assert_eq!(
            std::fs::read_to_string(&source).unwrap(),
            "0000000000000001 one.lua\n"
        );
        assert_eq!(
            std::fs::read_to_string(&written).unwrap(),
            "0000000000000001 one.lua\n0000000000000002 two.lua\n"
        );
    }

    #[test]
    fn test_missing_table_is_empty() {
        let dir = TempDir::new().unwrap();
        let db = NameDatabase::load_from_path(dir.path().join("absent.txt"), Generation::Legacy)
            .unwrap();
        assert!(db.is_empty());
        assert_eq!(db.generation(), Generation::Legacy);
    }
}
