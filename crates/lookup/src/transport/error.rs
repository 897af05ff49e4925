//! Transport Error Types

use derive_more::{Display, Error};

/// A transport error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The store could not be reached, or the connection dropped.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The store refused the query (malformed, too large, not permitted).
    #[display("query rejected: {_0}")]
    Rejected(#[error(not(source))] String),
    /// The store answered with something that isn't a list of records.
    #[display("invalid response from store")]
    InvalidResponse,
    /// The store is temporarily unable to answer.
    #[display("store unavailable")]
    Unavailable,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable)
    }
}
