//! The rotating writer.
//!
//! # Design
//!
//! ```text
//! write ──► checkers (cached stat only)
//!             │ triggered, no cycle in flight
//!             ▼
//!           swap: handle moves from app.log to _app.log      [op lock]
//!             │
//!             └─► background cycle
//!                   scan dir → match → sort → filters → processor
//!                   publish: rename _app.log → app.log      [op lock]
//! ```
//!
//! Appends hold the shared side of one `RwLock`; swapping, publishing and
//! closing hold the exclusive side, so no append straddles a handle change.
//! At most one background cycle exists at a time. A trigger that fires while
//! one is in flight is dropped, the checkers fire again on a later write if
//! rotation is still warranted.
//!
//! A failed cycle leaves writes going to the staging file. The next trigger
//! skips the swap and reruns the cycle, which publishes the staging file once
//! it succeeds.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};

use crate::config::{CompressFormat, RollConfig};
use crate::core::backlog;
use crate::core::{
    check_chain, filter_chain, Checker, Clock, CompressProcessor, CycleStage, Error, FamilyMatcher,
    FileBirthTime, FileStat, Filter, IntervalChecker, Matcher, MaxAgeFilter, MaxBackupsFilter,
    MaxSizeChecker, MetadataBirthTime, NoopObserver, Processor, RenameProcessor, Result, RollEvent,
    RollObserver, SystemClock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Primary,
    Staging,
}

struct Active {
    /// `None` once closed.
    file: Option<File>,
    target: Target,
}

struct Shared {
    path: PathBuf,
    staging_path: PathBuf,
    dir: PathBuf,
    base: String,

    checkers: Vec<Box<dyn Checker>>,
    filters: Vec<Box<dyn Filter>>,
    matcher: Box<dyn Matcher>,
    processor: Box<dyn Processor>,
    observer: Arc<dyn RollObserver>,
    clock: Arc<dyn Clock>,

    stat: FileStat,
    active: RwLock<Active>,
    in_flight: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// An append-only file that rotates itself.
///
/// `Roll` is `Send + Sync`; share it behind an `Arc` and call [`Roll::write`]
/// from any number of threads.
pub struct Roll {
    shared: Arc<Shared>,
}

impl Roll {
    /// Open `config.path` with the stock pipeline: interval and size
    /// checkers, max-backups and max-age filters, the family matcher and a
    /// rename (or compress) processor.
    pub fn open(config: &RollConfig) -> Result<Self> {
        RollBuilder::new(&config.path)
            .default_checkers(config)
            .default_filters(config)
            .compress(config.compress.clone())
            .open()
    }

    /// Start a custom pipeline for the file at `path`. The builder holds no
    /// stages until some are added.
    pub fn builder(path: impl Into<PathBuf>) -> RollBuilder {
        RollBuilder::new(path)
    }

    /// Append `buf` to the active file, rotating first if a checker fires.
    ///
    /// Returns the number of bytes the underlying file accepted.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.shared.maybe_rotate()?;
        self.shared.append(buf)
    }

    /// Flush the active handle. Fails with [`Error::Closed`] after `close`.
    pub fn flush(&self) -> Result<()> {
        let active = self.shared.active.read();
        let mut file = active.file.as_ref().ok_or(Error::Closed)?;
        file.flush()?;
        Ok(())
    }

    /// Close the active file and wait for any in-flight rotation cycle.
    ///
    /// Writes after `close` fail with [`Error::Closed`]. Closing twice is a
    /// no-op.
    pub fn close(&self) -> Result<()> {
        let file = self.shared.active.write().file.take();
        let synced = match file {
            Some(file) => file.sync_all().map_err(Error::from),
            None => Ok(()),
        };
        let drained = self.wait_for_rotation();
        synced.and(drained)
    }

    /// Block until the background cycle running at the time of the call, if
    /// any, has finished.
    pub fn wait_for_rotation(&self) -> Result<()> {
        let handle = self.shared.worker.lock().take();
        match handle {
            Some(handle) => handle.join().map_err(|_| Error::WorkerPanicked),
            None => Ok(()),
        }
    }

    /// Whether [`Roll::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.shared.active.read().file.is_none()
    }

    /// Primary path, `<dir>/<base>`.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Staging path, `<dir>/_<base>`. Writes go here while a cycle runs.
    pub fn staging_path(&self) -> &Path {
        &self.shared.staging_path
    }

    /// Cached size and times the checkers consult.
    pub fn stat(&self) -> &FileStat {
        &self.shared.stat
    }

    /// Cached size of the file currently receiving writes.
    pub fn size(&self) -> u64 {
        self.shared.stat.size()
    }
}

impl Drop for Roll {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("closing {}: {err}", self.shared.path.display());
        }
    }
}

impl fmt::Debug for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Roll")
            .field("path", &self.shared.path)
            .field("stat", &self.shared.stat)
            .field("in_flight", &self.shared.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl Write for Roll {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Roll::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Roll::flush(self).map_err(Into::into)
    }
}

impl Write for &Roll {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Roll::write(*self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Roll::flush(*self).map_err(Into::into)
    }
}

impl Shared {
    fn maybe_rotate(self: &Arc<Self>) -> Result<()> {
        if self.in_flight.load(Ordering::Acquire) {
            return Ok(());
        }
        if check_chain(&self.checkers, &self.path, &self.stat, self.clock.now())?.is_none() {
            return Ok(());
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        // A cycle may have published between the check and the claim.
        let checker = match check_chain(&self.checkers, &self.path, &self.stat, self.clock.now()) {
            Ok(Some(checker)) => checker,
            Ok(None) => {
                self.in_flight.store(false, Ordering::Release);
                return Ok(());
            }
            Err(err) => {
                self.in_flight.store(false, Ordering::Release);
                return Err(err);
            }
        };

        self.observer.event(&RollEvent::Triggered {
            checker,
            size: self.stat.size(),
        });
        if let Err(err) = self.rotate() {
            self.in_flight.store(false, Ordering::Release);
            return Err(err);
        }
        Ok(())
    }

    /// Move writes to the staging file (unless they already go there) and
    /// start a background cycle.
    fn rotate(self: &Arc<Self>) -> Result<()> {
        let mut active = self.active.write();
        if active.file.is_none() {
            return Err(Error::Closed);
        }

        if active.target == Target::Primary {
            let staging = open_append(&self.staging_path)?;
            drop(active.file.replace(staging));
            active.target = Target::Staging;
            log::debug!(
                "{} rotating, writes go to {}",
                self.path.display(),
                self.staging_path.display()
            );
            self.observer.event(&RollEvent::Swapped {
                staging: &self.staging_path,
            });
            self.stat.reset(&self.staging_path)?;
        }

        // Spawned under the op lock so `close` always sees the handle.
        let shared = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("rollfile-cycle".to_string())
            .spawn(move || shared.run_cycle())?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    fn append(&self, buf: &[u8]) -> Result<usize> {
        let active = self.active.read();
        let mut file = active.file.as_ref().ok_or(Error::Closed)?;
        let written = file.write(buf)?;
        self.stat.update(written as u64);
        Ok(written)
    }

    fn run_cycle(&self) {
        let _slot = InFlight(&self.in_flight);
        if let Err((stage, err)) = self.process_once() {
            log::warn!(
                "rotation of {} aborted during {stage}: {err}",
                self.path.display()
            );
            self.observer.event(&RollEvent::CycleAborted {
                stage,
                error: &err,
            });
        }
    }

    fn process_once(&self) -> std::result::Result<(), (CycleStage, Error)> {
        let entries = backlog::scan(&self.dir, &self.base, self.matcher.as_ref())
            .map_err(|err| (CycleStage::Scan, err))?;
        let names: Vec<String> = entries.iter().map(|entry| entry.name.clone()).collect();
        self.observer.event(&RollEvent::Matched { names: &names });

        let now = self.clock.now();
        let remains = filter_chain(&self.filters, &self.dir, entries, now, self.observer.as_ref())
            .map_err(|err| (CycleStage::Filter, err))?;

        self.processor
            .process(&self.dir, &remains, self.observer.as_ref())
            .map_err(|err| (CycleStage::Process, err))?;

        self.publish().map_err(|err| (CycleStage::Publish, err))
    }

    /// Rename the staging file into the primary path and point the handle
    /// back at it.
    fn publish(&self) -> Result<()> {
        let mut active = self.active.write();
        fs::rename(&self.staging_path, &self.path)?;
        active.target = Target::Primary;
        if active.file.is_some() {
            let file = open_append(&self.path)?;
            drop(active.file.replace(file));
        }
        drop(active);

        log::debug!("published {}", self.path.display());
        self.observer.event(&RollEvent::Published {
            primary: &self.path,
        });
        Ok(())
    }
}

/// Releases the single rotation slot when the cycle ends, panics included.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn open_append(path: &Path) -> Result<File> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

/// Assembles a [`Roll`] with a custom pipeline.
///
/// Without an explicit matcher the family matcher for the configured
/// compression is used; without an explicit processor, the rename processor
/// (or the compress processor when compression is configured).
pub struct RollBuilder {
    path: PathBuf,
    checkers: Vec<Box<dyn Checker>>,
    filters: Vec<Box<dyn Filter>>,
    matcher: Option<Box<dyn Matcher>>,
    processor: Option<Box<dyn Processor>>,
    compress: CompressFormat,
    observer: Arc<dyn RollObserver>,
    clock: Arc<dyn Clock>,
    birth_time: Arc<dyn FileBirthTime>,
}

impl RollBuilder {
    /// An empty pipeline for `path`: no checkers, no filters, default matcher
    /// and processor, no observer, system clock, metadata birth times.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            checkers: Vec::new(),
            filters: Vec::new(),
            matcher: None,
            processor: None,
            compress: CompressFormat::None,
            observer: Arc::new(NoopObserver),
            clock: Arc::new(SystemClock),
            birth_time: Arc::new(MetadataBirthTime),
        }
    }

    /// Append a checker. Checkers run in insertion order and the first that
    /// fires triggers rotation.
    pub fn checker(mut self, checker: impl Checker + 'static) -> Self {
        self.checkers.push(Box::new(checker));
        self
    }

    /// Append a filter. Each filter sees the survivors of the previous one.
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Replace the family matcher.
    pub fn matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Some(Box::new(matcher));
        self
    }

    /// Replace the processor applied to the survivors of the filters.
    pub fn processor(mut self, processor: impl Processor + 'static) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    /// Append the interval and max-size checkers described by `config`.
    pub fn default_checkers(self, config: &RollConfig) -> Self {
        self.checker(IntervalChecker::new(config.interval))
            .checker(MaxSizeChecker::new(config.max_size))
    }

    /// Append the max-backups and max-age filters described by `config`.
    pub fn default_filters(self, config: &RollConfig) -> Self {
        self.filter(MaxBackupsFilter::new(config.max_backups))
            .filter(MaxAgeFilter::new(config.max_age))
    }

    /// Go back to the family matcher for the base name and compression.
    pub fn default_matcher(mut self) -> Self {
        self.matcher = None;
        self
    }

    /// Go back to the rename processor, or the compress processor when
    /// compression is configured.
    pub fn default_processor(mut self) -> Self {
        self.processor = None;
        self
    }

    /// Store rotated files compressed with `format`.
    ///
    /// Replaces any matcher or processor set so far. `None` leaves the
    /// builder unchanged.
    pub fn compress(mut self, format: CompressFormat) -> Self {
        if format == CompressFormat::None {
            return self;
        }
        self.compress = format;
        self.matcher = None;
        self.processor = None;
        self
    }

    /// Receive rotation events. Defaults to [`NoopObserver`].
    pub fn observer(mut self, observer: Arc<dyn RollObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Time source for the interval checker and the max-age filter.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How the creation time of the active file is read.
    pub fn birth_time(mut self, birth_time: Arc<dyn FileBirthTime>) -> Self {
        self.birth_time = birth_time;
        self
    }

    /// Create the parent directory if needed and open the primary file.
    pub fn open(self) -> Result<Roll> {
        let base = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidPath(self.path.display().to_string()))?
            .to_string();
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staging_path = dir.join(format!("_{base}"));
        let path = dir.join(&base);

        let matcher = match self.matcher {
            Some(matcher) => matcher,
            None => Box::new(FamilyMatcher::new(&base, &self.compress)?),
        };
        let processor = match self.processor {
            Some(processor) => processor,
            None if self.compress == CompressFormat::None => Box::new(RenameProcessor),
            None => Box::new(CompressProcessor::new(self.compress.clone())),
        };

        fs::create_dir_all(&dir)?;
        let file = open_append(&path)?;
        let stat = FileStat::new(self.birth_time);
        stat.reset(&path)?;

        if staging_path.exists() {
            log::warn!(
                "{} exists, it will receive writes at the next rotation",
                staging_path.display()
            );
        }

        Ok(Roll {
            shared: Arc::new(Shared {
                path,
                staging_path,
                dir,
                base,
                checkers: self.checkers,
                filters: self.filters,
                matcher,
                processor,
                observer: self.observer,
                clock: self.clock,
                stat,
                active: RwLock::new(Active {
                    file: Some(file),
                    target: Target::Primary,
                }),
                in_flight: AtomicBool::new(false),
                worker: Mutex::new(None),
            }),
        })
    }
}
