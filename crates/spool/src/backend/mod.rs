//! Spool backend trait and implementations.
//!
//! This module defines the `SpoolBackend` trait, the byte-level storage that
//! typed [`SpoolWriter`](crate::SpoolWriter)s and [`Spooled`](crate::Spooled)
//! handles sit on top of.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalSpool;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockSpool;
use crate::SpoolId;
use crate::error::Result;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncWrite};

pub type BoxAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;
pub type BoxAsyncBufRead = Pin<Box<dyn AsyncBufRead + Send + 'static>>;

/// External storage for spooled records.
///
/// A backend only deals in bytes: it allocates a spool and hands out a
/// writer, later hands out a reader over whatever was written, and finally
/// releases the storage. Encoding records is the job of
/// [`SpoolWriter`](crate::SpoolWriter).
///
/// # Lifecycle
/// 1. [`create()`](Self::create) allocates storage and returns its id plus a
///    writer. The caller must `shutdown()` the writer before reading.
/// 2. [`reader()`](Self::reader) may be called any number of times until
///    the spool is released.
/// 3. [`release()`](Self::release) frees the storage. It is synchronous so
///    that it can run from `Drop`; releasing an unknown id is
///    [`NotFound`](crate::error::ErrorKind::NotFound).
///
/// # Examples
///
/// ```
/// use depinfo_spool::backend::{LocalSpool, SpoolBackend};
/// use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalSpool::temporary("scratch")?;
/// let (id, mut writer) = backend.create().await?;
/// writer.write_all(b"first\nsecond\n").await?;
/// writer.shutdown().await?;
///
/// let mut lines = backend.reader(&id).await?.lines();
/// assert_eq!(lines.next_line().await?.as_deref(), Some("first"));
///
/// backend.release(&id)?;
/// assert_eq!(backend.outstanding(), 0);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait SpoolBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Allocate a new, empty spool.
    async fn create(&self) -> Result<(SpoolId, BoxAsyncWrite)>;

    /// Open a buffered reader over everything written to the spool.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the spool
    /// does not exist (or has been released).
    async fn reader(&self, id: &SpoolId) -> Result<BoxAsyncBufRead>;

    /// Release the spool's storage.
    fn release(&self, id: &SpoolId) -> Result<()>;

    /// Number of spools created and not yet released.
    fn outstanding(&self) -> usize;
}
