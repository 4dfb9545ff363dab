//! Rotation engine.
//!
//! A [`Roll`] owns the active file and a pipeline of pluggable stages:
//!
//! - [`Checker`]s decide on the write path whether to rotate,
//! - a [`Matcher`] picks the rotation family out of the directory,
//! - [`Filter`]s enforce retention on the sorted family,
//! - a [`Processor`] shifts (and optionally compresses) the survivors.

mod backlog;
mod checker;
mod clock;
mod error;
mod filter;
mod matcher;
mod observer;
mod processor;
mod roll;
mod stat;

pub use backlog::{rotation_index, scan, sort_family, BacklogEntry};
pub use checker::{check_chain, Checker, IntervalChecker, MaxSizeChecker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use filter::{filter_chain, Filter, Filtered, MaxAgeFilter, MaxBackupsFilter};
pub use matcher::{FamilyMatcher, Matcher};
pub use observer::{CycleStage, LogObserver, NoopObserver, RollEvent, RollObserver};
pub use processor::{CompressProcessor, Processor, RenameProcessor, RotatedName};
pub use roll::{Roll, RollBuilder};
pub use stat::{FileBirthTime, FileStat, MetadataBirthTime, NoBirthTime};
