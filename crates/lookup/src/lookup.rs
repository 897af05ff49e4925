use crate::Context;
use crate::batch::batch;
use crate::error::Result;
use crate::join::join;
use crate::keys::{ContentKeyed, KeySet, ResultMap, collect};
use crate::schedule::spool_batches;
use depinfo_spool::Merged;
use depinfo_spool::error::Error as SpoolError;
use std::time::Instant;
use tracing::instrument;

/// A successful lookup.
#[derive(Debug)]
pub enum Outcome {
    /// Every key was looked up and every spool released.
    Complete(ResultMap),
    /// Every key was looked up, but releasing a spool failed afterwards. The
    /// results are valid; the spool may need cleaning up by hand.
    CleanupFailed { results: ResultMap, error: SpoolError },
}
impl Outcome {
    pub fn results(&self) -> &ResultMap {
        match self {
            Self::Complete(results) | Self::CleanupFailed { results, .. } => results,
        }
    }

    pub fn into_results(self) -> ResultMap {
        match self {
            Self::Complete(results) | Self::CleanupFailed { results, .. } => results,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Look up build and VCS details for the content key of every record.
///
/// The returned map has an entry for every distinct key, left at its default
/// when the store had no record for it. Records without a key are skipped;
/// if none has one, the store is never queried.
///
/// Batches run as tasks on the current Tokio runtime, so this must be called
/// from within one. The returned future is `Send` and may itself be spawned.
///
/// # Errors
///
/// Fails with the first batch that fails (see
/// [`spool_batches`](crate::spool_batches)), or when the spooled results
/// can't be read back. Either way nothing has been leaked and no partial
/// results are returned.
pub async fn lookup<I>(ctx: &Context, records: I) -> Result<Outcome>
where
    I: IntoIterator,
    I::Item: ContentKeyed,
{
    let (keys, results) = collect(records);
    lookup_keys(ctx, &keys, results).await
}

/// Same as [`lookup`], for an already collected key set. `results` is
/// expected to hold an entry for every key; records for keys without one are
/// ignored.
#[instrument(skip_all, fields(transport = ctx.transport.name(), keys = keys.len()))]
pub async fn lookup_keys(ctx: &Context, keys: &KeySet, mut results: ResultMap) -> Result<Outcome> {
    if keys.is_empty() {
        tracing::debug!("No content keys to look up");
        return Ok(Outcome::Complete(results));
    }
    let start = Instant::now();
    let spooled = spool_batches(ctx, batch(keys, ctx.options.batch_size)).await?;
    let batches = spooled.len();

    let mut merged = Merged::new(spooled);
    let joined = join(merged.records(), &mut results).await;
    let closed = merged.close();
    let stats = match joined {
        Ok(stats) => stats,
        Err(e) => {
            if let Err(close) = closed {
                tracing::warn!(error = %&*close, "Unable to release spooled results after failed join");
            }
            return Err(e);
        },
    };

    tracing::info!(
        batches,
        spooled = merged.parts(),
        records = merged.len(),
        joined = stats.joined,
        overwritten = stats.overwritten,
        ignored = stats.ignored,
        elapsed = ?start.elapsed(),
        "Lookup complete"
    );
    match closed {
        Ok(()) => Ok(Outcome::Complete(results)),
        Err(error) => {
            tracing::warn!(error = %&*error, "Lookup succeeded, but spooled results could not be released");
            Ok(Outcome::CleanupFailed { results, error })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{Dependency, Module};
    use crate::error::ErrorKind;
    use crate::models::{DependencyProps, MetadataRecord};
    use crate::transport::{Failure, MockTransport, TransportHandle};
    use crate::{DEFAULT_BATCH_SIZE, Options};
    use depinfo_spool::SpoolHandle;
    use depinfo_spool::backend::{LocalSpool, MockSpool, SpoolBackend};
    use std::num::NonZeroUsize;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        transport: Arc<MockTransport>,
        spool: Arc<MockSpool>,
        ctx: Context,
    }

    fn harness(transport: MockTransport, batch_size: usize, workers: usize) -> Harness {
        let transport = Arc::new(transport);
        let spool = Arc::new(MockSpool::default());
        let (t, s): (TransportHandle, SpoolHandle) = (transport.clone(), spool.clone());
        let ctx = Context::new(t, s).with_options(Options {
            batch_size: NonZeroUsize::new(batch_size).unwrap(),
            workers: NonZeroUsize::new(workers).unwrap(),
            repository: None,
        });
        Harness { transport, spool, ctx }
    }

    fn record(key: &str, build: u32) -> MetadataRecord {
        MetadataRecord::new(key)
            .with_property("build.name", "app")
            .with_property("build.number", build.to_string())
            .with_property("vcs.url", "https://git.example.com/app.git")
            .with_property("vcs.revision", format!("rev{build}"))
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|n| format!("{n:040x}")).collect()
    }

    #[tokio::test]
    async fn test_lookup_build_dependencies() {
        let store = MetadataRecord::new("456")
            .with_property("build.name", "Build-Name")
            .with_property("build.number", "Build-Number")
            .with_property("vcs.url", "www.vcs.com")
            .with_property("vcs.revision", "248");
        let h = harness(MockTransport::new([store]), 125, 3);
        let modules = vec![Module {
            id: "my-plugin:".to_string(),
            dependencies: vec![Dependency { id: "Dependency".to_string(), kind: Some("File".to_string()), sha1: Some("456".to_string()) }],
        }];

        let outcome = lookup(&h.ctx, modules.iter().flat_map(|m| &m.dependencies)).await.unwrap();
        assert!(outcome.is_complete());
        let results = outcome.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results["456"].build.as_deref(), Some("Build-Name/Build-Number"));
        assert_eq!(results["456"].vcs.url.as_deref(), Some("www.vcs.com"));
        assert_eq!(results["456"].vcs.revision.as_deref(), Some("248"));
        assert_eq!(h.spool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_empty_input_sends_no_queries() {
        let h = harness(MockTransport::new(Vec::new()), 125, 3);
        let outcome = lookup(&h.ctx, Vec::<String>::new()).await.unwrap();
        assert!(outcome.results().is_empty());
        assert_eq!(h.transport.query_count(), 0);
        assert_eq!(h.spool.created(), 0);
    }

    #[tokio::test]
    async fn test_keys_without_records_keep_defaults() {
        let keys = keys(5);
        let h = harness(MockTransport::new([record(&keys[2], 9)]), 2, 2);
        let results = lookup(&h.ctx, &keys).await.unwrap().into_results();
        assert_eq!(results.len(), 5);
        assert_eq!(results[&keys[2]].build.as_deref(), Some("app/9"));
        assert_eq!(results[&keys[0]], DependencyProps::default());
        // Three batches, two of which matched nothing.
        assert_eq!(h.transport.query_count(), 3);
        assert_eq!(h.spool.created(), 3);
        assert_eq!(h.spool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_every_key_is_queried_exactly_once() {
        let keys = keys(10);
        let store: Vec<_> = keys.iter().enumerate().map(|(n, k)| record(k, n as u32)).collect();
        let h = harness(MockTransport::new(store), 3, 2);
        let results = lookup(&h.ctx, &keys).await.unwrap().into_results();

        let sizes: Vec<usize> = h.transport.queries().iter().map(|q| q.keys().len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 10);
        let mut sorted = sizes.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, [1, 3, 3, 3]);
        for (n, key) in keys.iter().enumerate() {
            assert_eq!(results[key].build, Some(format!("app/{n}")));
            assert_eq!(results[key].vcs.label(), format!("https://git.example.com/app/commit/rev{n}"));
        }
    }

    #[tokio::test]
    async fn test_failing_batch_aborts_without_leaks() {
        let keys = keys(40);
        let store: Vec<_> = keys.iter().map(|k| record(k, 1)).collect();
        let transport = MockTransport::new(store)
            .fail_on(keys[7].clone(), Failure::MidStream)
            .with_latency(Duration::from_millis(5));
        let h = harness(transport, 4, 3);
        let err = lookup(&h.ctx, &keys).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Query(1)));
        // Ten batches; only those running alongside batch 1 got started.
        assert!(h.transport.query_count() <= 5);
        assert_eq!(h.spool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_workers() {
        let keys = keys(30);
        let transport = MockTransport::new(Vec::new()).with_latency(Duration::from_millis(5));
        let h = harness(transport, 2, 4);
        lookup(&h.ctx, &keys).await.unwrap();
        assert_eq!(h.transport.query_count(), 15);
        assert_eq!(h.transport.peak_concurrency(), 4);
    }

    #[tokio::test]
    async fn test_cleanup_failure_still_returns_results() {
        let keys = keys(4);
        let store: Vec<_> = keys.iter().map(|k| record(k, 3)).collect();
        let h = harness(MockTransport::new(store), 2, 2);
        h.spool.fail_releases(true);
        let outcome = lookup(&h.ctx, &keys).await.unwrap();
        let Outcome::CleanupFailed { results, error } = outcome else {
            panic!("expected cleanup failure");
        };
        assert!(matches!(&*error, depinfo_spool::error::ErrorKind::BackendError(_)));
        assert_eq!(results.len(), 4);
        assert!(results.values().all(|p| p.build.as_deref() == Some("app/3")));
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_lookup_future_is_send() {
        let h = harness(MockTransport::new(Vec::new()), 125, 3);
        let keys = keys(3);
        assert_send(&lookup(&h.ctx, &keys));
        assert_send(&lookup_keys(&h.ctx, &KeySet::default(), ResultMap::new()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lookup_can_be_spawned() {
        let keys = keys(12);
        let store: Vec<_> = keys.iter().map(|k| record(k, 4)).collect();
        let Harness { transport, spool, ctx } = harness(MockTransport::new(store), 5, 2);
        let outcome = tokio::spawn(async move { lookup(&ctx, keys).await }).await.unwrap().unwrap();
        let results = outcome.into_results();
        assert_eq!(results.len(), 12);
        assert!(results.values().all(|p| p.build.as_deref() == Some("app/4")));
        assert_eq!(transport.query_count(), 3);
        assert_eq!(spool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_lookup_with_local_spool() {
        let keys = keys(300);
        let store: Vec<_> = keys.iter().map(|k| record(k, 5)).collect();
        let spool = Arc::new(LocalSpool::temporary("test").unwrap());
        let transport: TransportHandle = Arc::new(MockTransport::new(store));
        let ctx = Context::new(transport, spool.clone());
        assert_eq!(ctx.options.batch_size, DEFAULT_BATCH_SIZE);

        let results = lookup(&ctx, &keys).await.unwrap().into_results();
        assert_eq!(results.len(), 300);
        assert!(results.values().all(|p| p.build.as_deref() == Some("app/5")));
        assert_eq!(spool.outstanding(), 0);
    }
}
