//! Remote query transport trait.
//!
//! Building HTTP clients, authenticating against the store and retrying
//! transient failures are the transport's business; a lookup only needs a
//! stream of records per query.

pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::{Failure, MockTransport};
use crate::models::MetadataRecord;
use crate::query::KeyQuery;
use crate::transport::error::Result;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub type SearchStream<'a> = Pin<Box<dyn Stream<Item = Result<MetadataRecord>> + Send + 'a>>;
pub type TransportHandle = Arc<dyn QueryTransport + Send + Sync>;

/// Sends queries to the metadata store.
pub trait QueryTransport: Send + Sync {
    /// Name of the configured store (used for logging only).
    fn name(&self) -> &str;

    /// Run `query`, streaming back every matching record.
    ///
    /// A failure may be reported before the first record or part-way through
    /// the results; either way it is the last item of the stream.
    fn search<'a>(&'a self, query: &'a KeyQuery) -> SearchStream<'a>;
}
