//! Batched metadata lookup for content-addressed build dependencies.
//!
//! Given the dependencies of a build (anything that is [`ContentKeyed`]),
//! [`lookup`] finds the metadata record for every distinct content key in a
//! remote store, then reports which build produced each dependency and which
//! VCS revision it came from.
//!
//! The store limits how large a single query may be, so keys are split into
//! batches ([`batch`]) and queried concurrently, with at most
//! [`Options::workers`] queries in flight. Every batch's results are
//! [spooled](depinfo_spool) to external storage instead of memory and the
//! spools are only read back, one after another, once every query has
//! succeeded. The first failing batch aborts the whole lookup, and no spool is
//! left behind on any path.

pub mod batch;
pub mod build;
pub mod error;
mod execute;
mod join;
pub mod keys;
mod lookup;
pub mod models;
pub mod query;
pub mod report;
mod schedule;
pub mod transport;

pub use crate::batch::batch;
pub use crate::execute::execute_batch;
pub use crate::join::{JoinStats, join};
pub use crate::keys::{ContentKeyed, KeySet, ResultMap, collect};
pub use crate::lookup::{Outcome, lookup, lookup_keys};
pub use crate::query::KeyQuery;
pub use crate::schedule::spool_batches;
use crate::transport::TransportHandle;
use depinfo_spool::SpoolHandle;
use std::num::NonZeroUsize;

/// Maximum number of keys in one query; larger key sets are split.
// The store rejects requests above a certain size.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(125).unwrap();
/// Maximum number of queries in flight at once.
pub const DEFAULT_WORKERS: NonZeroUsize = NonZeroUsize::new(3).unwrap();

/// Tunables for a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub batch_size: NonZeroUsize,
    pub workers: NonZeroUsize,
    /// Restrict every query to this repository. An empty name means no
    /// restriction.
    pub repository: Option<String>,
}
impl Default for Options {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            repository: None,
        }
    }
}

/// Collaborators shared by every stage of a lookup.
pub struct Context {
    /// Where queries are sent.
    pub transport: TransportHandle,
    /// Where per-batch results are spooled.
    pub spool: SpoolHandle,
    pub options: Options,
}
impl Context {
    pub fn new(transport: TransportHandle, spool: SpoolHandle) -> Self {
        Self {
            transport,
            spool,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}
