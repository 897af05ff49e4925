//! Disk-backed record spools.
//!
//! A spool is an append-then-read sequence of records that lives in external
//! storage instead of memory. Records are written once through a
//! [`SpoolWriter`], read back (forward-only) from the resulting [`Spooled`]
//! handle, and the backing storage is released exactly once when the handle
//! is closed or dropped. Several spools can be concatenated into one logical
//! stream with [`Merged`].
//!
//! Where the bytes live is decided by a [`SpoolBackend`]:
//! [`LocalSpool`](backend::LocalSpool) writes JSON Lines files to a directory
//! and [`MockSpool`](backend::MockSpool) (feature `mock`) keeps them in memory
//! while counting allocations, for leak detection in tests.

pub mod backend;
pub mod error;
mod merge;
mod models;
mod spooled;

pub use crate::backend::SpoolBackend;
pub use crate::merge::Merged;
pub use crate::models::SpoolId;
pub use crate::spooled::{RecordStream, SpoolWriter, Spooled};
use std::sync::Arc;

pub type SpoolHandle = Arc<dyn SpoolBackend + Send + Sync>;
