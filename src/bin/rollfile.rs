use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rollfile::{CompressFormat, LogObserver, Roll, RollConfig};

#[derive(Parser)]
#[command(name = "rollfile")]
#[command(about = "Copy standard input into a rotating file")]
struct Cli {
    /// Active file; rotated files are written next to it
    path: PathBuf,

    /// Rotate once the file holds this many bytes (0 disables)
    #[arg(long, default_value_t = 0)]
    max_size: i64,

    /// Rotate once the file is this many seconds old (0 disables)
    #[arg(long, default_value_t = 0)]
    interval_secs: u64,

    /// Remove backups older than this many seconds (0 disables)
    #[arg(long, default_value_t = 0)]
    max_age_secs: u64,

    /// Number of files to keep including the one being rotated (negative keeps all)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    max_backups: i64,

    /// Compression for rotated files: none, gzip or zlib
    #[arg(long, default_value = "none")]
    compress: CompressFormat,

    /// Log every rotation decision to stderr
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else {
        env_logger::init();
    }

    let config = RollConfig::new(cli.path)
        .max_size(cli.max_size)
        .interval(Duration::from_secs(cli.interval_secs))
        .max_age(Duration::from_secs(cli.max_age_secs))
        .max_backups(cli.max_backups)
        .compress(cli.compress);

    let mut builder = Roll::builder(&config.path)
        .default_checkers(&config)
        .default_filters(&config)
        .compress(config.compress.clone());
    if cli.verbose {
        builder = builder.observer(Arc::new(LogObserver));
    }
    let roll = builder.open()?;

    copy_lines(io::stdin().lock(), &roll)?;
    roll.close()?;
    Ok(())
}

/// Copy `input` into `roll` one line at a time, bytes untouched.
fn copy_lines(mut input: impl BufRead, roll: &Roll) -> rollfile::Result<u64> {
    let mut line = Vec::new();
    let mut copied = 0;
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            return Ok(copied);
        }
        copied += roll.write(&line)? as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn copies_raw_bytes_without_adding_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let roll = Roll::open(&RollConfig::new(&path)).unwrap();

        let input: &[u8] = b"one\n\xff\xfe\nlast";
        let copied = copy_lines(input, &roll).unwrap();
        roll.close().unwrap();

        assert_eq!(copied, input.len() as u64);
        assert_eq!(fs::read(&path).unwrap(), input);
    }
}
