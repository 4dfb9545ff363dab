use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("roll is closed")]
    Closed,
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid family pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("rotation worker panicked")]
    WorkerPanicked,
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
