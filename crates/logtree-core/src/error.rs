//! Error types for the log tree

use thiserror::Error;

/// Main error type for log tree operations
#[derive(Error, Debug)]
pub enum LogTreeError {
    /// A distinguished name failed validation
    #[error("Invalid DN: {0:?}")]
    InvalidDn(String),

    /// `OnlyRaw` and `OnlyLeveled` were requested by the same read
    #[error("Incompatible filters: cannot return logs that are simultaneously raw-only and leveled-only")]
    IncompatibleFilters,

    /// Write or close on a line buffer that has already been closed
    #[error("Already closed")]
    AlreadyClosed,

    /// A per-DN quota must retain at least one entry
    #[error("Invalid quota: {0}")]
    InvalidQuota(usize),

    /// A wire message could not be converted into a log entry
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Wire encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using LogTreeError
pub type LogTreeResult<T> = Result<T, LogTreeError>;

impl From<postcard::Error> for LogTreeError {
    fn from(err: postcard::Error) -> Self {
        LogTreeError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for LogTreeError {
    fn from(err: serde_json::Error) -> Self {
        LogTreeError::Codec(err.to_string())
    }
}
