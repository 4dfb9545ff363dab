//! Rotating file writer.
//!
//! [`Roll`] is an append-only sink that rotates its file when it grows too
//! large or too old, shifts and optionally compresses the backlog of earlier
//! rotations, and prunes backups beyond a retention policy. Rotation work runs
//! on a background thread so writers only pay for a handle swap.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rollfile::{CompressFormat, Roll, RollConfig, MB};
//!
//! let config = RollConfig::new("/var/log/app/app.log")
//!     .max_size(10 * MB)
//!     .max_backups(5)
//!     .max_age(Duration::from_secs(7 * 24 * 3600))
//!     .compress(CompressFormat::Gzip);
//! let roll = Roll::open(&config)?;
//! roll.write(b"hello\n")?;
//! roll.close()?;
//! # Ok::<(), rollfile::Error>(())
//! ```

pub mod config;
pub mod core;

pub use crate::config::{CompressFormat, RollConfig, GB, KB, MB, ONE_DAY, ONE_WEEK};
pub use crate::core::{
    Checker, Clock, CompressProcessor, Error, FamilyMatcher, FileBirthTime, FileStat, Filter,
    IntervalChecker, LogObserver, ManualClock, Matcher, MaxAgeFilter, MaxBackupsFilter,
    MaxSizeChecker, NoopObserver, Processor, RenameProcessor, Result, Roll, RollBuilder, RollEvent,
    RollObserver, SystemClock,
};
