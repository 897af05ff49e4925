use crate::backend::BoxAsyncWrite;
use crate::error::{ErrorKind, Result};
use crate::{SpoolHandle, SpoolId};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufWriter};

pub type RecordStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// A finished spool of `T` records in external storage.
///
/// The handle owns the backing storage: it is released exactly once, either
/// by an explicit [`close()`](Self::close) (which reports failures) or, as a
/// fallback, when the handle is dropped (which can only log them). Closing an
/// already-closed spool is a no-op.
pub struct Spooled<T> {
    backend: SpoolHandle,
    id: SpoolId,
    records: u64,
    closed: bool,
    _record: PhantomData<fn() -> T>,
}

impl<T> Spooled<T> {
    pub fn id(&self) -> &SpoolId {
        &self.id
    }

    /// Number of records in the spool.
    pub fn len(&self) -> u64 {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the backing storage.
    ///
    /// The spool counts as closed even when the backend reports an error, so
    /// a failed release is never attempted a second time.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.backend.release(&self.id)
    }
}

impl<T: DeserializeOwned + Send + 'static> Spooled<T> {
    /// Stream the records back, in the order they were written.
    ///
    /// Each call opens a fresh reader, so sibling spools (or repeated reads of
    /// this one) don't interfere with each other. Reading a closed spool
    /// yields a single [`Closed`](ErrorKind::Closed) error.
    pub fn records(&self) -> RecordStream<'_, T> {
        Box::pin(stream! {
            if self.closed {
                yield Err(exn::Exn::from(ErrorKind::Closed(self.id.clone())));
                return;
            }
            let reader = match self.backend.reader(&self.id).await {
                Ok(reader) => reader,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let mut lines = reader.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.is_empty() => continue,
                    Ok(Some(line)) => yield serde_json::from_str::<T>(&line).or_raise(|| ErrorKind::InvalidData(self.id.clone())),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(exn::Exn::from(ErrorKind::Io(e)));
                        break;
                    },
                }
            }
        })
    }
}

impl<T> Drop for Spooled<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        tracing::debug!(backend = self.backend.name(), spool = %self.id, "Releasing spool that was never closed");
        if let Err(e) = self.close() {
            tracing::warn!(backend = self.backend.name(), spool = %self.id, error = %&*e, "Unable to release spool");
        }
    }
}

impl<T> Debug for Spooled<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Spooled")
            .field("backend", &self.backend.name())
            .field("id", &self.id)
            .field("records", &self.records)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Writes `T` records into a newly allocated spool, one JSON document per
/// line.
///
/// The spool is owned by the writer until [`finish()`](Self::finish) hands
/// it over as a [`Spooled`]. A writer that is [aborted](Self::abort) or
/// dropped releases its storage, so a failed producer never leaves a
/// half-written spool behind.
///
/// # Examples
///
/// ```
/// use depinfo_spool::backend::LocalSpool;
/// use depinfo_spool::{SpoolHandle, SpoolWriter};
/// use futures::TryStreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend: SpoolHandle = Arc::new(LocalSpool::temporary("example")?);
/// let mut writer = SpoolWriter::create(&backend).await?;
/// for n in 1..=3u32 {
///     writer.write(&n).await?;
/// }
/// let mut spooled = writer.finish().await?;
///
/// let numbers: Vec<u32> = spooled.records().try_collect().await?;
/// assert_eq!(numbers, vec![1, 2, 3]);
/// spooled.close()?;
/// # Ok(())
/// # }
/// ```
pub struct SpoolWriter<T> {
    // Declared before `spooled` so the file is closed before a dropped
    // writer releases it.
    writer: BufWriter<BoxAsyncWrite>,
    spooled: Spooled<T>,
    line: Vec<u8>,
}

impl<T: Serialize> SpoolWriter<T> {
    /// Allocate a new spool on `backend` and open it for writing.
    pub async fn create(backend: &SpoolHandle) -> Result<Self> {
        let (id, writer) = backend.create().await?;
        Ok(Self {
            writer: BufWriter::new(writer),
            spooled: Spooled {
                backend: backend.clone(),
                id,
                records: 0,
                closed: false,
                _record: PhantomData,
            },
            line: Vec::new(),
        })
    }

    pub fn id(&self) -> &SpoolId {
        self.spooled.id()
    }

    /// Number of records written so far.
    pub fn len(&self) -> u64 {
        self.spooled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spooled.is_empty()
    }

    /// Append one record.
    pub async fn write(&mut self, record: &T) -> Result<()> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, record).or_raise(|| ErrorKind::InvalidData(self.spooled.id.clone()))?;
        self.line.push(b'\n');
        self.writer.write_all(&self.line).await.map_err(ErrorKind::Io)?;
        self.spooled.records += 1;
        Ok(())
    }

    /// Flush everything to the backend and hand over ownership of the spool.
    ///
    /// If flushing fails the spool is released before the error is returned.
    pub async fn finish(mut self) -> Result<Spooled<T>> {
        // Shutdown flushes the buffer before shutting down the inner writer.
        self.writer.shutdown().await.map_err(ErrorKind::Io)?;
        Ok(self.spooled)
    }

    /// Discard everything written and release the spool.
    ///
    /// The writer is closed first: some platforms refuse to delete a file
    /// that is still open.
    pub fn abort(self) -> Result<()> {
        let Self { writer, mut spooled, .. } = self;
        drop(writer);
        spooled.close()
    }
}
