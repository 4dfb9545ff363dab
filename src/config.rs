//! Rotation configuration.
//!
//! Defines the flat configuration record used by [`Roll::open`](crate::Roll::open)
//! and the compression format selector.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const KB: i64 = 1024;
pub const MB: i64 = 1024 * KB;
pub const GB: i64 = 1024 * MB;

pub const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);
pub const ONE_WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for a rotating file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RollConfig {
    /// Location of the active file.
    pub path: PathBuf,

    /// Rotate once the active file is this old.
    /// Default: zero (disabled)
    pub interval: Duration,

    /// Rotate once the active file holds this many bytes.
    /// Default: 0 (disabled, as is any negative value)
    pub max_size: i64,

    /// Remove backups last modified longer ago than this.
    /// Default: zero (disabled)
    pub max_age: Duration,

    /// Number of family files to keep, counting the file being rotated out.
    /// Default: -1 (unbounded); zero removes everything
    pub max_backups: i64,

    /// Compression applied to rotated files.
    /// Default: none
    pub compress: CompressFormat,
}

impl RollConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_size(mut self, max_size: i64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_backups(mut self, max_backups: i64) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn compress(mut self, compress: CompressFormat) -> Self {
        self.compress = compress;
        self
    }
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            interval: Duration::ZERO,
            max_size: 0,
            max_age: Duration::ZERO,
            max_backups: -1,
            compress: CompressFormat::None,
        }
    }
}

/// Compression applied to rotated files.
///
/// Parsing never fails: unknown names become [`CompressFormat::Unsupported`],
/// which rotates without compressing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub enum CompressFormat {
    #[default]
    None,
    Gzip,
    Zlib,
    Unsupported(String),
}

impl CompressFormat {
    /// File name extension carried by compressed backups.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            CompressFormat::Gzip => Some(".gz"),
            CompressFormat::Zlib => Some(".z"),
            CompressFormat::None | CompressFormat::Unsupported(_) => None,
        }
    }

    /// Whether this build can actually produce the format.
    pub fn is_supported(&self) -> bool {
        match self {
            CompressFormat::Gzip | CompressFormat::Zlib => cfg!(feature = "compress"),
            CompressFormat::None | CompressFormat::Unsupported(_) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CompressFormat::None => "none",
            CompressFormat::Gzip => "gzip",
            CompressFormat::Zlib => "zlib",
            CompressFormat::Unsupported(name) => name,
        }
    }
}

impl FromStr for CompressFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => CompressFormat::None,
            "gzip" | "gz" => CompressFormat::Gzip,
            "zlib" | "z" => CompressFormat::Zlib,
            _ => CompressFormat::Unsupported(s.to_string()),
        })
    }
}

impl From<String> for CompressFormat {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(format) => format,
            Err(never) => match never {},
        }
    }
}

impl From<CompressFormat> for String {
    fn from(value: CompressFormat) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CompressFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
