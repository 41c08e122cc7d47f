//! Sorting errors.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::num::ParseIntError;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Common I/O error.
    IO(io::Error),
    /// Record key prefix is not a valid decimal integer.
    ParseError { key: String, source: Option<ParseIntError> },
    /// Compact chunk record is truncated.
    FormatError(String),
    /// Task finished without producing a result.
    TaskPanicked(String),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::TempDir(err) => Some(err),
            SortError::ThreadPoolBuildError(err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::ParseError { source, .. } => source.as_ref().map(|err| err as &(dyn Error + 'static)),
            SortError::FormatError(_) => None,
            SortError::TaskPanicked(_) => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::ParseError { key, source: Some(err) } => {
                write!(f, "record key {:?} is not a valid integer: {}", key, err)
            }
            SortError::ParseError { key, source: None } => write!(f, "record key {:?} is not valid utf-8", key),
            SortError::FormatError(msg) => write!(f, "compact chunk format error: {}", msg),
            SortError::TaskPanicked(msg) => write!(f, "sorting task panicked: {}", msg),
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::IO(err)
    }
}
