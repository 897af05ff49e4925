//! Lookup Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Transport and spool failures are
//! kept as children of the lookup error that they caused.

use derive_more::{Display, Error};

/// A lookup error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for lookup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a lookup failure.
///
/// Any of these aborts the whole lookup: no partial results are returned.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The store could not answer the query for one batch (its position in
    /// batch order is attached).
    #[display("query for batch {_0} failed")]
    Query(#[error(not(source))] usize),
    /// The task running a batch panicked or was cancelled by the runtime.
    #[display("worker for batch {_0} stopped unexpectedly")]
    Worker(#[error(not(source))] usize),
    /// Results could not be written to, or read back from, a spool.
    #[display("unable to spool query results")]
    Spool,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Nothing is retried inside a lookup; a failed query may succeed if the
    /// whole lookup is attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}
