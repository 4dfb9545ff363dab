//! Side-channel reporting of rotation decisions.
//!
//! Every checker, filter and processor decision is announced as a
//! [`RollEvent`]. Observers never influence behavior; the default one drops
//! everything.

use std::fmt;
use std::path::Path;

/// Stage of a background cycle that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Scan,
    Filter,
    Process,
    Publish,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Scan => "scan",
            CycleStage::Filter => "filter",
            CycleStage::Process => "process",
            CycleStage::Publish => "publish",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum RollEvent<'a> {
    /// A checker asked for rotation.
    Triggered { checker: &'static str, size: u64 },
    /// The active handle moved to the staging file.
    Swapped { staging: &'a Path },
    /// The sorted rotation family found in the directory.
    Matched { names: &'a [String] },
    /// A filter discarded a backlog file.
    Removed { filter: &'static str, name: &'a str },
    Renamed { from: &'a str, to: &'a str },
    Compressed { from: &'a str, to: &'a str },
    /// A configured capability is unavailable and a fallback is in use.
    Degraded { reason: &'a str },
    /// The staging file was renamed into the primary path.
    Published { primary: &'a Path },
    CycleAborted {
        stage: CycleStage,
        error: &'a (dyn std::error::Error + 'static),
    },
}

pub trait RollObserver: Send + Sync + 'static {
    fn event(&self, event: &RollEvent<'_>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RollObserver for NoopObserver {
    fn event(&self, _event: &RollEvent<'_>) {}
}

/// Forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl RollObserver for LogObserver {
    fn event(&self, event: &RollEvent<'_>) {
        match event {
            RollEvent::Triggered { checker, size } => {
                log::debug!("[{checker}] triggered at {size} bytes");
            }
            RollEvent::Swapped { staging } => {
                log::debug!("writes now go to {}", staging.display());
            }
            RollEvent::Matched { names } => {
                for name in names.iter() {
                    log::trace!("[sorted] {name}");
                }
            }
            RollEvent::Removed { filter, name } => {
                log::debug!("[{filter}] remove {name}");
            }
            RollEvent::Renamed { from, to } => log::debug!("rename {from} -> {to}"),
            RollEvent::Compressed { from, to } => log::debug!("compress {from} -> {to}"),
            RollEvent::Degraded { reason } => log::warn!("degraded: {reason}"),
            RollEvent::Published { primary } => {
                log::debug!("published {}", primary.display());
            }
            RollEvent::CycleAborted { stage, error } => {
                log::warn!("rotation aborted during {stage}: {error}");
            }
        }
    }
}
