//! Directory scan and canonical ordering of a rotation family.
//!
//! The family of `app.log` is ordered freshest first:
//!
//! ```text
//! app.log        <- file being rotated out (no suffix)
//! app.log.1
//! app.log.2.gz
//! app.log.10
//! ```
//!
//! Entries are ordered by their parsed rotation index, ties broken by name
//! length and then by name. Filters and processors rely on this order.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::core::{Matcher, Result};

/// A file belonging to a rotation family, as seen by one directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogEntry {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

impl BacklogEntry {
    pub fn new(name: impl Into<String>, size: u64, modified: SystemTime) -> Self {
        Self {
            name: name.into(),
            size,
            modified,
        }
    }
}

/// List the regular files in `dir` accepted by `matcher`, in rotation order.
pub fn scan(dir: &Path, base: &str, matcher: &dyn Matcher) -> Result<Vec<BacklogEntry>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if !matcher.matches(&name) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        entries.push(BacklogEntry {
            name,
            size: meta.len(),
            modified: meta.modified()?,
        });
    }

    sort_family(base, &mut entries);
    Ok(entries)
}

/// Sort `entries` freshest first.
pub fn sort_family(base: &str, entries: &mut [BacklogEntry]) {
    entries.sort_by(|a, b| compare_names(base, &a.name, &b.name));
}

fn compare_names(base: &str, a: &str, b: &str) -> Ordering {
    rotation_index(base, a)
        .cmp(&rotation_index(base, b))
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| a.cmp(b))
}

/// Numeric rotation suffix of `name` relative to `base`.
///
/// `None` for the unsuffixed file, which sorts before every index.
pub fn rotation_index(base: &str, name: &str) -> Option<u64> {
    let rest = name.strip_prefix(base).unwrap_or(name);
    let rest = rest.strip_prefix('.')?;
    let digits = rest.split('.').next().unwrap_or("");
    match digits.parse::<u64>() {
        Ok(index) => Some(index),
        Err(_) => Some(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressFormat;
    use crate::core::FamilyMatcher;
    use tempfile::tempdir;

    fn names(entries: &[BacklogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn entry(name: &str) -> BacklogEntry {
        BacklogEntry::new(name, 0, SystemTime::UNIX_EPOCH)
    }

    #[test]
    fn rotation_index_parses_suffixes() {
        assert_eq!(rotation_index("app.log", "app.log"), None);
        assert_eq!(rotation_index("app.log", "app.log.3"), Some(3));
        assert_eq!(rotation_index("app.log", "app.log.12.gz"), Some(12));
    }

    #[test]
    fn sort_is_numeric_not_lexical() {
        let mut entries: Vec<_> = ["app.log.10", "app.log.2", "app.log", "app.log.1"]
            .into_iter()
            .map(entry)
            .collect();
        sort_family("app.log", &mut entries);
        assert_eq!(
            names(&entries),
            vec!["app.log", "app.log.1", "app.log.2", "app.log.10"]
        );
    }

    #[test]
    fn sort_orders_compressed_backups_by_index() {
        let mut entries: Vec<_> = ["app.log.3.gz", "app.log.1.gz", "app.log.2.gz", "app.log"]
            .into_iter()
            .map(entry)
            .collect();
        sort_family("app.log", &mut entries);
        assert_eq!(
            names(&entries),
            vec!["app.log", "app.log.1.gz", "app.log.2.gz", "app.log.3.gz"]
        );
    }

    #[test]
    fn scan_selects_family_only() {
        let dir = tempdir().unwrap();
        for name in ["app.log", "app.log.2", "app.log.1", "_app.log", "other.log", "app.log.x"] {
            fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        fs::create_dir(dir.path().join("app.log.9")).unwrap();

        let matcher = FamilyMatcher::new("app.log", &CompressFormat::None).unwrap();
        let entries = scan(dir.path(), "app.log", &matcher).unwrap();
        assert_eq!(names(&entries), vec!["app.log", "app.log.1", "app.log.2"]);
        assert_eq!(entries[1].size, "app.log.1".len() as u64);
    }
}
