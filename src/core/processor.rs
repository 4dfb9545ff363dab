//! Backlog transforms applied to the survivors of the filter chain.
//!
//! Entries are processed oldest first so that bumping `app.log.1` to
//! `app.log.2` never lands on a file that has not been moved yet.

use std::fs;
use std::io;
use std::path::Path;

use crate::config::CompressFormat;
use crate::core::{BacklogEntry, Result, RollEvent, RollObserver};

/// Transforms the survivors of a rotation cycle.
///
/// `remains` is freshest first. A failure stops the chain; entries already
/// transformed stay transformed.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;
    fn process(
        &self,
        dir: &Path,
        remains: &[BacklogEntry],
        observer: &dyn RollObserver,
    ) -> Result<()>;
}

/// A family file name split into its parts.
///
/// `app.log.3.gz` is stem `app.log`, index 3, compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotatedName<'a> {
    pub stem: &'a str,
    pub index: Option<u64>,
    pub compressed: bool,
}

impl<'a> RotatedName<'a> {
    pub fn parse(name: &'a str, ext: Option<&str>) -> Self {
        let (body, compressed) = match ext {
            Some(ext) if name.len() > ext.len() && name.ends_with(ext) => {
                (&name[..name.len() - ext.len()], true)
            }
            _ => (name, false),
        };
        let split = body.rsplit_once('.').and_then(|(stem, tail)| {
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
                tail.parse::<u64>().ok().map(|index| (stem, index))
            } else {
                None
            }
        });
        match split {
            Some((stem, index)) => Self {
                stem,
                index: Some(index),
                compressed,
            },
            None => Self {
                stem: body,
                index: None,
                compressed,
            },
        }
    }

    /// Name of the next rotation slot, carrying `ext` if given.
    pub fn next(&self, ext: Option<&str>) -> String {
        let index = self.index.map_or(1, |index| index.saturating_add(1));
        format!("{}.{}{}", self.stem, index, ext.unwrap_or(""))
    }
}

/// Bumps the trailing number of every survivor: `app.log` becomes
/// `app.log.1`, `app.log.1` becomes `app.log.2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameProcessor;

impl Processor for RenameProcessor {
    fn name(&self) -> &'static str {
        "RenameProcessor"
    }

    fn process(
        &self,
        dir: &Path,
        remains: &[BacklogEntry],
        observer: &dyn RollObserver,
    ) -> Result<()> {
        for entry in remains.iter().rev() {
            let target = RotatedName::parse(&entry.name, None).next(None);
            rename_in(dir, &entry.name, &target, observer)?;
        }
        Ok(())
    }
}

/// Bumps survivors like [`RenameProcessor`] but stores them compressed.
///
/// Uncompressed survivors (always including the file just rotated out, which
/// lands in the `.1<ext>` slot) are streamed through the compressor; those
/// already compressed are only renamed. An unsupported format falls back to
/// plain renaming.
#[derive(Debug, Clone)]
pub struct CompressProcessor {
    format: CompressFormat,
}

impl CompressProcessor {
    pub fn new(format: CompressFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &CompressFormat {
        &self.format
    }

    fn extension(&self) -> Option<&'static str> {
        if self.format.is_supported() {
            self.format.extension()
        } else {
            None
        }
    }
}

impl Processor for CompressProcessor {
    fn name(&self) -> &'static str {
        "CompressProcessor"
    }

    fn process(
        &self,
        dir: &Path,
        remains: &[BacklogEntry],
        observer: &dyn RollObserver,
    ) -> Result<()> {
        let Some(ext) = self.extension() else {
            if !remains.is_empty() {
                let reason = format!("compression '{}' unavailable, renaming only", self.format);
                observer.event(&RollEvent::Degraded { reason: &reason });
            }
            return RenameProcessor.process(dir, remains, observer);
        };

        for entry in remains.iter().rev() {
            let parsed = RotatedName::parse(&entry.name, Some(ext));
            let target = parsed.next(Some(ext));
            if parsed.compressed {
                rename_in(dir, &entry.name, &target, observer)?;
            } else {
                compress_in(&self.format, dir, &entry.name, &target, observer)?;
            }
        }
        Ok(())
    }
}

fn rename_in(dir: &Path, from: &str, to: &str, observer: &dyn RollObserver) -> Result<()> {
    observer.event(&RollEvent::Renamed { from, to });
    fs::rename(dir.join(from), dir.join(to))?;
    Ok(())
}

/// Compress `from` into `to`, then remove `from`.
///
/// On failure the partial `to` is removed and `from` is left untouched.
fn compress_in(
    format: &CompressFormat,
    dir: &Path,
    from: &str,
    to: &str,
    observer: &dyn RollObserver,
) -> Result<()> {
    observer.event(&RollEvent::Compressed { from, to });
    let src = dir.join(from);
    let dst = dir.join(to);

    if let Err(err) = compress_file(format, &src, &dst) {
        match fs::remove_file(&dst) {
            Ok(()) => {}
            Err(cleanup) if cleanup.kind() == io::ErrorKind::NotFound => {}
            Err(cleanup) => log::warn!("leaving partial {}: {cleanup}", dst.display()),
        }
        return Err(err.into());
    }
    fs::remove_file(&src)?;
    Ok(())
}

#[cfg(feature = "compress")]
fn compress_file(format: &CompressFormat, src: &Path, dst: &Path) -> io::Result<()> {
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::fs::{File, OpenOptions};

    let mut input = File::open(src)?;
    let output = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)?;

    let output = match format {
        CompressFormat::Gzip => {
            let mut encoder = GzEncoder::new(output, Compression::default());
            io::copy(&mut input, &mut encoder)?;
            encoder.finish()?
        }
        CompressFormat::Zlib => {
            let mut encoder = ZlibEncoder::new(output, Compression::default());
            io::copy(&mut input, &mut encoder)?;
            encoder.finish()?
        }
        CompressFormat::None | CompressFormat::Unsupported(_) => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("no encoder for '{format}'"),
            ));
        }
    };
    output.sync_all()
}

#[cfg(not(feature = "compress"))]
fn compress_file(format: &CompressFormat, _src: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("built without support for '{format}'"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NoopObserver;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn entries(names: &[&str]) -> Vec<BacklogEntry> {
        names
            .iter()
            .map(|name| BacklogEntry::new(*name, 0, SystemTime::now()))
            .collect()
    }

    #[test]
    fn parse_and_bump_names() {
        assert_eq!(RotatedName::parse("abc.log", None).next(None), "abc.log.1");
        assert_eq!(RotatedName::parse("abc.log.1", None).next(None), "abc.log.2");
        assert_eq!(RotatedName::parse("abc.log.99", None).next(None), "abc.log.100");
        assert_eq!(RotatedName::parse("abc", None).next(None), "abc.1");
        assert_eq!(
            RotatedName::parse("abc.log", Some(".gz")).next(Some(".gz")),
            "abc.log.1.gz"
        );
        assert_eq!(
            RotatedName::parse("abc.log.1.gz", Some(".gz")).next(Some(".gz")),
            "abc.log.2.gz"
        );

        let parsed = RotatedName::parse("abc.log.7.z", Some(".z"));
        assert_eq!(parsed.stem, "abc.log");
        assert_eq!(parsed.index, Some(7));
        assert!(parsed.compressed);
    }

    #[test]
    fn rename_processes_oldest_first() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.log.1"), b"one").unwrap();
        fs::write(dir.path().join("app.log.2"), b"two").unwrap();

        RenameProcessor
            .process(dir.path(), &entries(&["app.log.1", "app.log.2"]), &NoopObserver)
            .unwrap();

        assert!(!dir.path().join("app.log.1").exists());
        assert_eq!(fs::read(dir.path().join("app.log.2")).unwrap(), b"one");
        assert_eq!(fs::read(dir.path().join("app.log.3")).unwrap(), b"two");
    }

    #[test]
    fn rename_moves_primary_into_first_slot() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.log"), b"current").unwrap();
        fs::write(dir.path().join("app.log.1"), b"older").unwrap();

        RenameProcessor
            .process(dir.path(), &entries(&["app.log", "app.log.1"]), &NoopObserver)
            .unwrap();

        assert!(!dir.path().join("app.log").exists());
        assert_eq!(fs::read(dir.path().join("app.log.1")).unwrap(), b"current");
        assert_eq!(fs::read(dir.path().join("app.log.2")).unwrap(), b"older");
    }

    #[test]
    fn rename_failure_stops_chain() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.log"), b"current").unwrap();
        // app.log.1 is listed but missing, so the first (oldest) step fails
        let result =
            RenameProcessor.process(dir.path(), &entries(&["app.log", "app.log.1"]), &NoopObserver);
        assert!(result.is_err());
        assert!(dir.path().join("app.log").exists());
    }

    #[test]
    fn unsupported_format_degrades_to_rename() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.log"), b"current").unwrap();

        let processor = CompressProcessor::new(CompressFormat::Unsupported("nope".into()));
        processor
            .process(dir.path(), &entries(&["app.log"]), &NoopObserver)
            .unwrap();

        assert_eq!(fs::read(dir.path().join("app.log.1")).unwrap(), b"current");
    }

    #[cfg(feature = "compress")]
    #[test]
    fn failed_compression_removes_partial_output() {
        let dir = tempdir().unwrap();
        // A directory opens but cannot be read, so the encoder output exists
        // when the copy fails.
        fs::create_dir(dir.path().join("app.log")).unwrap();

        let result = CompressProcessor::new(CompressFormat::Gzip).process(
            dir.path(),
            &entries(&["app.log"]),
            &NoopObserver,
        );

        assert!(result.is_err());
        assert!(dir.path().join("app.log").is_dir());
        assert!(!dir.path().join("app.log.1.gz").exists());
    }

    #[cfg(feature = "compress")]
    #[test]
    fn gzip_compresses_first_slot_and_renames_the_rest() {
        use flate2::read::GzDecoder;
        use std::fs::File;
        use std::io::Read;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.log"), b"hello rotation").unwrap();
        fs::write(dir.path().join("app.log.1.gz"), b"opaque").unwrap();

        CompressProcessor::new(CompressFormat::Gzip)
            .process(dir.path(), &entries(&["app.log", "app.log.1.gz"]), &NoopObserver)
            .unwrap();

        assert!(!dir.path().join("app.log").exists());
        assert_eq!(fs::read(dir.path().join("app.log.2.gz")).unwrap(), b"opaque");

        let mut decoded = String::new();
        GzDecoder::new(File::open(dir.path().join("app.log.1.gz")).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "hello rotation");
    }

    #[cfg(feature = "compress")]
    #[test]
    fn zlib_uses_its_own_extension() {
        use flate2::read::ZlibDecoder;
        use std::fs::File;
        use std::io::Read;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.log"), b"zlib body").unwrap();

        CompressProcessor::new(CompressFormat::Zlib)
            .process(dir.path(), &entries(&["app.log"]), &NoopObserver)
            .unwrap();

        let mut decoded = Vec::new();
        ZlibDecoder::new(File::open(dir.path().join("app.log.1.z")).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, b"zlib body");
    }

    #[cfg(feature = "compress")]
    #[test]
    fn compression_failure_leaves_original() {
        let dir = tempdir().unwrap();
        // the source is a directory, so reading it fails mid-copy
        fs::create_dir(dir.path().join("app.log")).unwrap();

        let result = CompressProcessor::new(CompressFormat::Gzip).process(
            dir.path(),
            &entries(&["app.log"]),
            &NoopObserver,
        );

        assert!(result.is_err());
        assert!(dir.path().join("app.log").exists());
        assert!(!dir.path().join("app.log.1.gz").exists());
    }
}
