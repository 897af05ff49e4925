use crate::error::{ErrorKind, Result};
use crate::keys::ResultMap;
use crate::models::{DependencyProps, MetadataRecord};
use depinfo_spool::RecordStream;
use exn::ResultExt;
use futures::StreamExt;
use std::collections::HashSet;

/// Counters from one [`join`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Records written into the result map.
    pub joined: u64,
    /// Records that replaced an earlier record for the same key.
    pub overwritten: u64,
    /// Records for keys that were never asked for.
    pub ignored: u64,
}

/// Fill `results` from `records`, in a single forward pass.
///
/// Each record overwrites the entry for its key with the build and VCS
/// details taken from its properties. Keys without an entry are skipped.
/// When the store returns several records for one key the last one wins;
/// every such overwrite is logged and counted.
pub async fn join(mut records: RecordStream<'_, MetadataRecord>, results: &mut ResultMap) -> Result<JoinStats> {
    let mut stats = JoinStats::default();
    let mut seen = HashSet::new();
    while let Some(record) = records.next().await {
        let record = record.or_raise(|| ErrorKind::Spool)?;
        let Some(entry) = results.get_mut(&record.key) else {
            tracing::trace!(key = %record.key, "Ignoring record for a key that was not requested");
            stats.ignored += 1;
            continue;
        };
        if !seen.insert(record.key.clone()) {
            tracing::debug!(key = %record.key, repo = ?record.repo, path = ?record.path, "Multiple records for key; last one wins");
            stats.overwritten += 1;
        }
        *entry = DependencyProps::from_properties(&record.properties);
        stats.joined += 1;
    }
    Ok(stats)
}
