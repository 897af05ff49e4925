use crate::error::{ErrorKind, Result};
use crate::{RecordStream, Spooled};
use async_stream::stream;
use serde::de::DeserializeOwned;

/// Several spools read back as one logical, forward-only stream.
///
/// Parts are concatenated in the order given. There is no merge key: callers
/// that need a global order must ensure the parts are disjoint (as batches of
/// distinct keys are) or sort downstream.
///
/// The merged stream takes ownership of its parts: [`close()`](Self::close)
/// closes every part exactly once, and dropping it releases whatever wasn't
/// closed.
///
/// # Examples
///
/// ```
/// use depinfo_spool::backend::LocalSpool;
/// use depinfo_spool::{Merged, SpoolHandle, SpoolWriter};
/// use futures::TryStreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend: SpoolHandle = Arc::new(LocalSpool::temporary("example")?);
/// let mut parts = Vec::new();
/// for batch in [["a", "b"], ["c", "d"]] {
///     let mut writer = SpoolWriter::create(&backend).await?;
///     for key in batch {
///         writer.write(&key.to_string()).await?;
///     }
///     parts.push(Some(writer.finish().await?));
/// }
/// // Batches that produced nothing are simply absent.
/// parts.push(None);
///
/// let mut merged = Merged::new(parts);
/// let keys: Vec<String> = merged.records().try_collect().await?;
/// assert_eq!(keys, ["a", "b", "c", "d"]);
/// merged.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Merged<T> {
    parts: Vec<Spooled<T>>,
    consumed: bool,
}

impl<T> Merged<T> {
    pub fn new(parts: impl IntoIterator<Item = Option<Spooled<T>>>) -> Self {
        Self {
            parts: parts.into_iter().flatten().collect(),
            consumed: false,
        }
    }

    /// Total number of records across all parts.
    pub fn len(&self) -> u64 {
        self.parts.iter().map(Spooled::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of (non-absent) spools being merged.
    pub fn parts(&self) -> usize {
        self.parts.len()
    }

    /// Close every part.
    ///
    /// All parts are closed even if some fail; the first failure is returned
    /// and the rest are logged. Calling this again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let mut first = None;
        for part in &mut self.parts {
            if let Err(e) = part.close() {
                match first {
                    None => first = Some(e),
                    Some(_) => tracing::warn!(spool = %part.id(), error = %&*e, "Unable to release merged spool"),
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<T: DeserializeOwned + Send + 'static> Merged<T> {
    /// Stream every record of every part, each exactly once.
    ///
    /// May only be called once; later calls yield a single
    /// [`Consumed`](ErrorKind::Consumed) error.
    pub fn records(&mut self) -> RecordStream<'_, T> {
        let consumed = std::mem::replace(&mut self.consumed, true);
        let parts = &self.parts;
        Box::pin(stream! {
            if consumed {
                yield Err(exn::Exn::from(ErrorKind::Consumed));
                return;
            }
            for part in parts {
                for await record in part.records() {
                    yield record;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockSpool, SpoolBackend};
    use crate::{SpoolHandle, SpoolWriter};
    use futures::TryStreamExt;
    use rstest::rstest;
    use std::sync::Arc;

    fn mock() -> (Arc<MockSpool>, SpoolHandle) {
        let mock = Arc::new(MockSpool::default());
        let handle: SpoolHandle = mock.clone();
        (mock, handle)
    }

    /// One spool per entry of `sizes`, with globally unique keys.
    async fn spools(handle: &SpoolHandle, sizes: &[usize]) -> Vec<Option<Spooled<String>>> {
        let mut parts = Vec::new();
        let mut next = 0;
        for &size in sizes {
            let mut writer = SpoolWriter::create(handle).await.unwrap();
            for _ in 0..size {
                writer.write(&format!("key-{next}")).await.unwrap();
                next += 1;
            }
            parts.push(Some(writer.finish().await.unwrap()));
        }
        parts
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0])]
    #[case(&[3])]
    #[case(&[3, 3, 3, 1])]
    #[case(&[0, 5, 0, 2])]
    #[tokio::test]
    async fn test_merge_loses_nothing(#[case] sizes: &[usize]) {
        let (mock, handle) = mock();
        let mut merged = Merged::new(spools(&handle, sizes).await);
        let total: usize = sizes.iter().sum();
        assert_eq!(merged.len(), total as u64);
        let keys: Vec<String> = merged.records().try_collect().await.unwrap();
        let expected: Vec<String> = (0..total).map(|n| format!("key-{n}")).collect();
        assert_eq!(keys, expected);
        merged.close().unwrap();
        assert_eq!(mock.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_absent_parts_are_skipped() {
        let (_, handle) = mock();
        let mut parts = spools(&handle, &[2]).await;
        parts.insert(0, None);
        parts.push(None);
        let merged = Merged::new(parts);
        assert_eq!(merged.parts(), 1);
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test]
    async fn test_consumed_once() {
        let (_, handle) = mock();
        let mut merged = Merged::new(spools(&handle, &[1, 1]).await);
        assert_eq!(merged.records().try_collect::<Vec<_>>().await.unwrap().len(), 2);
        let err = merged.records().try_next().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Consumed));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mock, handle) = mock();
        let mut merged = Merged::new(spools(&handle, &[1, 2, 3]).await);
        merged.close().unwrap();
        merged.close().unwrap();
        assert_eq!(mock.released(), 3);
        drop(merged);
        assert_eq!(mock.released(), 3);
    }

    #[tokio::test]
    async fn test_close_closes_every_part_despite_failures() {
        let (mock, handle) = mock();
        let mut merged = Merged::new(spools(&handle, &[1, 1, 1]).await);
        mock.fail_releases(true);
        assert!(merged.close().is_err());
        assert_eq!(mock.released(), 3);
        assert_eq!(mock.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_parts() {
        let (mock, handle) = mock();
        drop(Merged::new(spools(&handle, &[1, 1]).await));
        assert_eq!(mock.outstanding(), 0);
    }
}
