//! In-memory transport for testing.

use crate::models::MetadataRecord;
use crate::query::KeyQuery;
use crate::transport::error::ErrorKind;
use crate::transport::{QueryTransport, SearchStream};
use async_stream::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// When a query containing a failing key reports its error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Before any record.
    Immediately,
    /// After every matching record has been streamed.
    MidStream,
}

/// Serves records from memory, evaluating each [`KeyQuery`] against them.
///
/// Every query is logged, and the number of queries running at the same time
/// is tracked so tests can check concurrency limits (combine with
/// [`with_latency()`](Self::with_latency) so queries actually overlap).
///
/// ```
/// use depinfo_lookup::KeyQuery;
/// use depinfo_lookup::models::MetadataRecord;
/// use depinfo_lookup::transport::{MockTransport, QueryTransport};
/// use futures::TryStreamExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = MockTransport::new([MetadataRecord::new("456"), MetadataRecord::new("789")]);
/// let query = KeyQuery::new(["456", "123"]);
/// let found: Vec<MetadataRecord> = transport.search(&query).try_collect().await?;
/// assert_eq!(found, [MetadataRecord::new("456")]);
/// assert_eq!(transport.query_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockTransport {
    name: String,
    records: Vec<MetadataRecord>,
    failures: HashMap<String, Failure>,
    latency: Duration,
    queries: Mutex<Vec<KeyQuery>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTransport {
    pub fn new(records: impl IntoIterator<Item = MetadataRecord>) -> Self {
        Self {
            name: "mock".to_string(),
            records: records.into_iter().collect(),
            failures: HashMap::new(),
            latency: Duration::ZERO,
            queries: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Fail every query that includes `key`.
    pub fn fail_on(mut self, key: impl Into<String>, failure: Failure) -> Self {
        self.failures.insert(key.into(), failure);
        self
    }

    /// Delay every query before it answers.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every query received so far, in the order they started.
    pub fn queries(&self) -> Vec<KeyQuery> {
        self.log().clone()
    }

    pub fn query_count(&self) -> usize {
        self.log().len()
    }

    /// Highest number of queries that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn log(&self) -> MutexGuard<'_, Vec<KeyQuery>> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueryTransport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, query: &'a KeyQuery) -> SearchStream<'a> {
        Box::pin(stream! {
            let _running = Running::start(&self.in_flight, &self.peak);
            self.log().push(query.clone());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let failure = query.keys().iter().find_map(|k| self.failures.get(k).map(|f| (k, *f)));
            if let Some((key, Failure::Immediately)) = failure {
                yield Err(exn::Exn::from(ErrorKind::Rejected(format!("simulated failure for {key}"))));
                return;
            }
            for record in self.records.iter().filter(|r| query.matches(r)) {
                yield Ok(record.clone());
            }
            if let Some((key, Failure::MidStream)) = failure {
                yield Err(exn::Exn::from(ErrorKind::Network(format!("simulated disconnect after {key}"))));
            }
        })
    }
}

/// Counts a query as running until dropped.
struct Running<'a> {
    in_flight: &'a AtomicUsize,
}
impl<'a> Running<'a> {
    fn start(in_flight: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { in_flight }
    }
}
impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
