//! In-memory spool backend for testing.

use crate::SpoolId;
use crate::backend::{BoxAsyncBufRead, BoxAsyncWrite, SpoolBackend};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

type Buffer = Arc<Mutex<Vec<u8>>>;

struct Entry {
    buffer: Buffer,
    // Set while the spool's writer is alive.
    writing: Arc<AtomicBool>,
}

fn lock(buffer: &Buffer) -> MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory spool backend for testing.
///
/// Besides storing spools in a `HashMap`, it keeps count of every spool
/// created and released so tests can assert that nothing leaked. It also
/// counts spools released while their writer was still open, which a real
/// filesystem (Windows in particular) may refuse:
///
/// ```
/// use depinfo_spool::backend::{MockSpool, SpoolBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockSpool::default();
/// let (id, _writer) = backend.create().await?;
/// assert_eq!(backend.outstanding(), 1);
///
/// backend.release(&id)?;
/// assert_eq!((backend.created(), backend.released(), backend.outstanding()), (1, 1, 0));
/// # Ok(())
/// # }
/// ```
pub struct MockSpool {
    name: String,
    storage: Mutex<HashMap<SpoolId, Entry>>,
    next: AtomicUsize,
    released: AtomicUsize,
    released_while_writing: AtomicUsize,
    fail_release: AtomicBool,
}

impl MockSpool {
    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent [`release()`](SpoolBackend::release) report a
    /// [`BackendError`](ErrorKind::BackendError). The spool still counts as
    /// released, mirroring a backend that lost track of a file it was asked
    /// to delete.
    pub fn fail_releases(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    /// Total number of spools ever created.
    pub fn created(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    /// Total number of successful-or-not release calls for known spools.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Number of release calls made while the spool's writer was still open.
    pub fn released_while_writing(&self) -> usize {
        self.released_while_writing.load(Ordering::SeqCst)
    }

    fn storage(&self) -> MutexGuard<'_, HashMap<SpoolId, Entry>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
impl Default for MockSpool {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            storage: Mutex::new(HashMap::new()),
            next: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            released_while_writing: AtomicUsize::new(0),
            fail_release: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SpoolBackend for MockSpool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self) -> Result<(SpoolId, BoxAsyncWrite)> {
        let id = SpoolId::new(format!("mock-{}", self.next.fetch_add(1, Ordering::SeqCst)));
        let (buffer, writing) = (Buffer::default(), Arc::new(AtomicBool::new(true)));
        let entry = Entry { buffer: buffer.clone(), writing: writing.clone() };
        self.storage().insert(id.clone(), entry);
        Ok((id, Box::pin(MockWriter { buffer, writing })))
    }

    async fn reader(&self, id: &SpoolId) -> Result<BoxAsyncBufRead> {
        let buffer = self
            .storage()
            .get(id)
            .map(|entry| entry.buffer.clone())
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.clone())))?;
        let bytes = lock(&buffer).clone();
        Ok(Box::pin(Cursor::new(bytes)))
    }

    fn release(&self, id: &SpoolId) -> Result<()> {
        let entry = self.storage().remove(id).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.clone())))?;
        self.released.fetch_add(1, Ordering::SeqCst);
        if entry.writing.load(Ordering::SeqCst) {
            self.released_while_writing.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_release.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError(format!("simulated release failure for {id}")));
        }
        Ok(())
    }

    fn outstanding(&self) -> usize {
        self.storage().len()
    }
}

/// Appends straight into the shared buffer; nothing to flush.
struct MockWriter {
    buffer: Buffer,
    writing: Arc<AtomicBool>,
}
impl Drop for MockWriter {
    fn drop(&mut self) {
        self.writing.store(false, Ordering::SeqCst);
    }
}
impl AsyncWrite for MockWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        lock(&self.buffer).extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockSpool::default();
        let (id, mut writer) = backend.create().await.unwrap();
        writer.write_all(b"hello\nworld\n").await.unwrap();
        writer.shutdown().await.unwrap();
        let mut lines = backend.reader(&id).await.unwrap().lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("world"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_counts() {
        let backend = MockSpool::default().with_name("counting");
        let (first, _) = backend.create().await.unwrap();
        let (_second, _) = backend.create().await.unwrap();
        backend.release(&first).unwrap();
        assert_eq!(backend.name(), "counting");
        assert_eq!(backend.created(), 2);
        assert_eq!(backend.released(), 1);
        assert_eq!(backend.outstanding(), 1);
    }

    #[tokio::test]
    async fn test_release_unknown() {
        let backend = MockSpool::default();
        let err = backend.release(&SpoolId::new("nope")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert_eq!(backend.released(), 0);
    }

    #[tokio::test]
    async fn test_failing_release_still_frees() {
        let backend = MockSpool::default();
        backend.fail_releases(true);
        let (id, _) = backend.create().await.unwrap();
        let err = backend.release(&id).unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        assert_eq!(backend.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_release_with_open_writer_is_counted() {
        let backend = MockSpool::default();
        let (open, _writer) = backend.create().await.unwrap();
        let (closed, writer) = backend.create().await.unwrap();
        drop(writer);
        backend.release(&closed).unwrap();
        assert_eq!(backend.released_while_writing(), 0);
        backend.release(&open).unwrap();
        assert_eq!(backend.released_while_writing(), 1);
    }

    #[tokio::test]
    async fn test_reader_not_found() {
        let backend = MockSpool::default();
        let err = backend.reader(&SpoolId::new("missing")).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
