//! Spool Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::SpoolId;
use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A spool error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for spool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Spool is unknown to the backend (never created, or already released).
    #[display("spool not found: {_0}")]
    NotFound(#[error(not(source))] SpoolId),
    /// Spool has been closed and its storage released; it can't be read.
    #[display("spool already closed: {_0}")]
    Closed(#[error(not(source))] SpoolId),
    /// A merged stream is forward-only and may be consumed once.
    #[display("merged spool stream already consumed")]
    Consumed,
    /// A record could not be encoded into, or decoded from, the spool.
    #[display("invalid record in spool: {_0}")]
    InvalidData(#[error(not(source))] SpoolId),
    /// Spool directory is not usable (relative, or not a directory).
    #[display("invalid spool directory: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::BackendError(_))
    }
}
