//! Rotation triggers.

use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::core::{FileStat, Result};

/// Decides whether the active file should be rotated.
///
/// Checkers run on the write path against cached state only; they must not
/// touch the filesystem on the common path.
pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, path: &Path, stat: &FileStat, now: SystemTime) -> Result<bool>;
}

/// Triggers once the file has existed for `interval`.
///
/// A zero interval disables it, and so does a file without a known birth time.
#[derive(Debug, Clone, Copy)]
pub struct IntervalChecker {
    interval: Duration,
}

impl IntervalChecker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Checker for IntervalChecker {
    fn name(&self) -> &'static str {
        "IntervalChecker"
    }

    fn check(&self, _path: &Path, stat: &FileStat, now: SystemTime) -> Result<bool> {
        if self.interval.is_zero() {
            return Ok(false);
        }
        let Some(birth) = stat.birth_time() else {
            return Ok(false);
        };
        // A birth time in the future (clock step) counts as not elapsed.
        Ok(now
            .duration_since(birth)
            .map(|age| age >= self.interval)
            .unwrap_or(false))
    }
}

/// Triggers once the cached size reaches `max_size`; non-positive disables it.
#[derive(Debug, Clone, Copy)]
pub struct MaxSizeChecker {
    max_size: i64,
}

impl MaxSizeChecker {
    pub fn new(max_size: i64) -> Self {
        Self { max_size }
    }
}

impl Checker for MaxSizeChecker {
    fn name(&self) -> &'static str {
        "MaxSizeChecker"
    }

    fn check(&self, _path: &Path, stat: &FileStat, _now: SystemTime) -> Result<bool> {
        if self.max_size <= 0 {
            return Ok(false);
        }
        Ok(stat.size() >= self.max_size as u64)
    }
}

/// Runs `checkers` in order and returns the name of the first that fires.
///
/// The first error aborts the chain.
pub fn check_chain(
    checkers: &[Box<dyn Checker>],
    path: &Path,
    stat: &FileStat,
    now: SystemTime,
) -> Result<Option<&'static str>> {
    for checker in checkers {
        if checker.check(path, stat, now)? {
            return Ok(Some(checker.name()));
        }
    }
    Ok(None)
}
