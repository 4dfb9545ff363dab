//! Retention filters over a sorted rotation family.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::core::{BacklogEntry, Result, RollEvent, RollObserver};

/// Result of one filter stage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filtered {
    pub remains: Vec<BacklogEntry>,
    pub removed: Vec<BacklogEntry>,
}

/// Partitions a freshest-first family into entries to keep and to discard.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    fn filter(&self, entries: Vec<BacklogEntry>, now: SystemTime) -> Result<Filtered>;

    /// Dispose of the entries this filter removed. Deletes them by default.
    fn discard(
        &self,
        dir: &Path,
        removed: &[BacklogEntry],
        observer: &dyn RollObserver,
    ) -> Result<()> {
        for entry in removed {
            observer.event(&RollEvent::Removed {
                filter: self.name(),
                name: &entry.name,
            });
            fs::remove_file(dir.join(&entry.name))?;
        }
        Ok(())
    }
}

/// Keeps the `max_backups` freshest entries. Negative keeps everything.
#[derive(Debug, Clone, Copy)]
pub struct MaxBackupsFilter {
    max_backups: i64,
}

impl MaxBackupsFilter {
    pub fn new(max_backups: i64) -> Self {
        Self { max_backups }
    }
}

impl Filter for MaxBackupsFilter {
    fn name(&self) -> &'static str {
        "MaxBackupsFilter"
    }

    fn filter(&self, mut entries: Vec<BacklogEntry>, _now: SystemTime) -> Result<Filtered> {
        if self.max_backups < 0 {
            return Ok(Filtered {
                remains: entries,
                removed: Vec::new(),
            });
        }
        let keep = usize::try_from(self.max_backups).unwrap_or(usize::MAX);
        let removed = if entries.len() > keep {
            entries.split_off(keep)
        } else {
            Vec::new()
        };
        Ok(Filtered {
            remains: entries,
            removed,
        })
    }
}

/// Drops everything from the first entry older than `max_age` onward.
///
/// Assumes the input is age-ordered, freshest first. A zero `max_age`
/// disables the filter.
#[derive(Debug, Clone, Copy)]
pub struct MaxAgeFilter {
    max_age: Duration,
}

impl MaxAgeFilter {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

impl Filter for MaxAgeFilter {
    fn name(&self) -> &'static str {
        "MaxAgeFilter"
    }

    fn filter(&self, mut entries: Vec<BacklogEntry>, now: SystemTime) -> Result<Filtered> {
        if self.max_age.is_zero() {
            return Ok(Filtered {
                remains: entries,
                removed: Vec::new(),
            });
        }
        let cut = entries
            .iter()
            .position(|entry| {
                now.duration_since(entry.modified)
                    .map(|age| age >= self.max_age)
                    .unwrap_or(false)
            })
            .unwrap_or(entries.len());
        let removed = entries.split_off(cut);
        Ok(Filtered {
            remains: entries,
            removed,
        })
    }
}

/// Run `filters` in order, discarding each stage's removals before the next
/// stage runs. Returns the survivors of the last stage.
pub fn filter_chain(
    filters: &[Box<dyn Filter>],
    dir: &Path,
    entries: Vec<BacklogEntry>,
    now: SystemTime,
    observer: &dyn RollObserver,
) -> Result<Vec<BacklogEntry>> {
    let mut remains = entries;
    for filter in filters {
        let stage = filter.filter(remains, now)?;
        if !stage.removed.is_empty() {
            filter.discard(dir, &stage.removed, observer)?;
        }
        remains = stage.remains;
    }
    Ok(remains)
}
