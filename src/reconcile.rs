//! Corpus reconciliation
//!
//! Given a directory of files extracted without names and a directory of
//! the same files carrying their real names, match them by whole-file
//! xxHash32 checksum. The result is a list of `<unnamed stem> <name>` lines
//! an operator merges into the name table by hand.
//!
//! Files sharing a checksum inside one corpus are all kept: the unnamed side
//! emits one indexed line per file, the named side joins its candidates with
//! `_OR_`.

use crate::error::Result;
use crate::hash::hash32_content;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CANDIDATE_SEPARATOR: &str = "_OR_";

/// File names of one corpus grouped by content checksum
#[derive(Debug, Default, Clone)]
pub struct ChecksumIndex {
    order: Vec<u32>,
    files: HashMap<u32, Vec<String>>,
}

impl ChecksumIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every regular file directly inside `dir`, in file name order
    pub fn build(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        paths.sort();

        let mut index = Self::new();
        for path in paths.into_iter().filter(|p| p.is_file()) {
            let checksum = hash32_content(&fs::read(&path)?);
            let name = file_name(&path);
            index.insert(checksum, name);
        }

        info!(dir = %dir.display(), files = index.file_count(), checksums = index.len(), "indexed corpus");
        Ok(index)
    }

    /// Record `name` under `checksum`. Returns true when the checksum was
    /// already present.
    pub fn insert(&mut self, checksum: u32, name: impl Into<String>) -> bool {
        let name = name.into();
        match self.files.get_mut(&checksum) {
            Some(existing) => {
                warn!(
                    checksum = %format!("{:08X}", checksum),
                    name = %name,
                    existing = %existing.join(" "),
                    "duplicate content"
                );
                existing.push(name);
                true
            }
            None => {
                self.order.push(checksum);
                self.files.insert(checksum, vec![name]);
                false
            }
        }
    }

    pub fn get(&self, checksum: u32) -> Option<&[String]> {
        self.files.get(&checksum).map(Vec::as_slice)
    }

    /// Number of distinct checksums
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// `(checksum, names)` in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[String])> {
        self.order
            .iter()
            .map(move |checksum| (*checksum, self.files[checksum].as_slice()))
    }
}

/// One line of the reconciliation output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Stem of the unnamed file
    pub unnamed: String,
    /// Position among unnamed files sharing one checksum
    pub index: Option<usize>,
    /// Named files with the same content
    pub candidates: Vec<String>,
}

impl Association {
    /// The candidates as a single name: `a.lua`, or `a_OR_b.lua` when
    /// several named files share the content.
    pub fn name(&self) -> String {
        flatten_candidates(&self.candidates)
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{} {}{}", self.unnamed, index, self.name()),
            None => write!(f, "{} {}", self.unnamed, self.name()),
        }
    }
}

/// Join candidate names with `_OR_`, keeping the extension of the last one
/// only: `[a.lua, b.lua, c.lua]` → `a_OR_b_OR_c.lua`
pub fn flatten_candidates(candidates: &[String]) -> String {
    let Some((last, rest)) = candidates.split_last() else {
        return String::new();
    };

    let mut out = String::new();
    for name in rest {
        out.push_str(&file_stem(name));
        out.push_str(CANDIDATE_SEPARATOR);
    }
    out.push_str(last);
    out
}

/// Pair every unnamed checksum found in the named corpus
pub fn reconcile_indexes(unnamed: &ChecksumIndex, named: &ChecksumIndex) -> Vec<Association> {
    let mut associations = Vec::new();

    for (checksum, files) in unnamed.iter() {
        let Some(candidates) = named.get(checksum) else {
            continue;
        };

        let indexed = files.len() > 1;
        for (index, file) in files.iter().enumerate() {
            associations.push(Association {
                unnamed: file_stem(file),
                index: indexed.then_some(index),
                candidates: candidates.to_vec(),
            });
        }
    }

    associations
}

/// Index both directories and pair them up
pub fn reconcile(unnamed_dir: &Path, named_dir: &Path) -> Result<Vec<Association>> {
    let unnamed = ChecksumIndex::build(unnamed_dir)?;
    let named = ChecksumIndex::build(named_dir)?;
    let associations = reconcile_indexes(&unnamed, &named);

    info!(
        unnamed = unnamed.file_count(),
        named = named.file_count(),
        matched = associations.len(),
        "reconciled corpora"
    );
    Ok(associations)
}

/// Association list text, one line per association
pub fn render(associations: &[Association]) -> String {
    let mut out = String::new();
    for association in associations {
        out.push_str(&association.to_string());
        out.push('\n');
    }
    out
}

pub fn write_associations<P: AsRef<Path>>(path: P, associations: &[Association]) -> Result<()> {
    fs::write(path, render(associations))?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flatten_candidates() {
        assert_eq!(flatten_candidates(&names(&["a.lua"])), "a.lua");
        assert_eq!(flatten_candidates(&names(&["a.lua", "b.lua"])), "a_OR_b.lua");
        assert_eq!(
            flatten_candidates(&names(&["a.lua", "b.lua", "c.lua"])),
            "a_OR_b_OR_c.lua"
        );
        assert_eq!(flatten_candidates(&[]), "");
    }

    #[test]
    fn test_index_keeps_duplicates() {
        let mut index = ChecksumIndex::new();
        assert!(!index.insert(7, "x.lua"));
        assert!(index.insert(7, "y.lua"));
        assert_eq!(index.get(7).unwrap(), &names(&["x.lua", "y.lua"])[..]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.file_count(), 2);
    }

    #[test]
    fn test_single_match() {
        let mut unnamed = ChecksumIndex::new();
        unnamed.insert(1, "0000ABCD.lua");
        unnamed.insert(2, "0000FFFF.lua");
        let mut named = ChecksumIndex::new();
        named.insert(1, "npc_talk.lua");

        let associations = reconcile_indexes(&unnamed, &named);
        assert_eq!(render(&associations), "0000ABCD npc_talk.lua\n");
    }

    #[test]
    fn test_unnamed_collisions_are_indexed() {
        let mut unnamed = ChecksumIndex::new();
        unnamed.insert(9, "AAAA.lua");
        unnamed.insert(9, "BBBB.lua");
        let mut named = ChecksumIndex::new();
        named.insert(9, "one.lua");
        named.insert(9, "two.lua");

        let associations = reconcile_indexes(&unnamed, &named);
        assert_eq!(associations.len(), 2);
        assert_eq!(associations[0].candidates, names(&["one.lua", "two.lua"]));
        assert_eq!(
            render(&associations),
            "AAAA 0one_OR_two.lua\nBBBB 1one_OR_two.lua\n"
        );
    }
}
