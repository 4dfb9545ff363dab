//! Cached metadata for the active file.
//!
//! The write path must not pay for a `stat` syscall per write, so the size is
//! tracked incrementally from the byte counts the writes report and only
//! re-read from disk when a file is opened or swapped.

use std::fs::{self, Metadata};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::core::Result;

/// Capability for reading a file's creation time.
///
/// Not every platform or filesystem records one; returning `None` makes the
/// interval checker stay quiet instead of failing.
pub trait FileBirthTime: Send + Sync + 'static {
    fn birth_time(&self, meta: &Metadata) -> Option<SystemTime>;
}

/// Reads the birth time through `Metadata::created`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataBirthTime;

impl FileBirthTime for MetadataBirthTime {
    fn birth_time(&self, meta: &Metadata) -> Option<SystemTime> {
        meta.created().ok()
    }
}

/// Never reports a birth time.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBirthTime;

impl FileBirthTime for NoBirthTime {
    fn birth_time(&self, _meta: &Metadata) -> Option<SystemTime> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Times {
    modified: SystemTime,
    birth: Option<SystemTime>,
}

/// Point-in-time knowledge of the file a `Roll` is appending to.
pub struct FileStat {
    size: AtomicU64,
    times: RwLock<Times>,
    birth_source: Arc<dyn FileBirthTime>,
}

impl FileStat {
    pub fn new(birth_source: Arc<dyn FileBirthTime>) -> Self {
        Self {
            size: AtomicU64::new(0),
            times: RwLock::new(Times {
                modified: SystemTime::UNIX_EPOCH,
                birth: None,
            }),
            birth_source,
        }
    }

    /// Re-read size and timestamps from `path`.
    ///
    /// On failure the cached values are left untouched.
    pub fn reset(&self, path: &Path) -> Result<()> {
        let meta = fs::metadata(path)?;
        let modified = meta.modified()?;
        let birth = self.birth_source.birth_time(&meta);

        let mut times = self.times.write();
        self.size.store(meta.len(), Ordering::Release);
        *times = Times { modified, birth };
        Ok(())
    }

    /// Account for `delta` freshly appended bytes.
    pub fn update(&self, delta: u64) {
        self.size.fetch_add(delta, Ordering::AcqRel);
        self.times.write().modified = SystemTime::now();
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn mod_time(&self) -> SystemTime {
        self.times.read().modified
    }

    pub fn birth_time(&self) -> Option<SystemTime> {
        self.times.read().birth
    }
}

impl Default for FileStat {
    fn default() -> Self {
        Self::new(Arc::new(MetadataBirthTime))
    }
}

impl std::fmt::Debug for FileStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let times = *self.times.read();
        f.debug_struct("FileStat")
            .field("size", &self.size())
            .field("modified", &times.modified)
            .field("birth", &times.birth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn reset_reads_size_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"0123456789").unwrap();

        let stat = FileStat::default();
        stat.reset(&path).unwrap();
        assert_eq!(stat.size(), 10);
    }

    #[test]
    fn reset_missing_file_keeps_previous_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"abc").unwrap();

        let stat = FileStat::default();
        stat.reset(&path).unwrap();
        assert!(stat.reset(&dir.path().join("missing.log")).is_err());
        assert_eq!(stat.size(), 3);
    }

    #[test]
    fn update_accumulates_deltas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"").unwrap();

        let stat = FileStat::default();
        stat.reset(&path).unwrap();
        for len in [20, 20, 7] {
            stat.update(len);
        }
        assert_eq!(stat.size(), 47);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let stat = Arc::new(FileStat::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stat = Arc::clone(&stat);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stat.update(3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stat.size(), 8 * 1000 * 3);
    }

    #[test]
    fn no_birth_time_source_reports_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"x").unwrap();

        let stat = FileStat::new(Arc::new(NoBirthTime));
        stat.reset(&path).unwrap();
        assert!(stat.birth_time().is_none());
    }
}
