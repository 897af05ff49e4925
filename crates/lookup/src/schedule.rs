use crate::Context;
use crate::error::{ErrorKind, Result};
use crate::execute::execute_batch;
use crate::models::MetadataRecord;
use crate::query::KeyQuery;
use depinfo_asyncutils::{Aborted, try_join_bounded};
use depinfo_spool::Spooled;
use exn::ResultExt;
use tracing::Instrument;

/// Query every batch, with at most `ctx.options.workers` queries in flight,
/// and collect each batch's spool in batch order (`None` for batches that
/// matched nothing).
///
/// Each batch runs as its own task on the current Tokio runtime, so batches
/// are decoded and spooled in parallel on a multi-threaded runtime. Must be
/// called from within a runtime.
///
/// The first failing batch wins: no further batches are started, the ones
/// already running are allowed to finish, and every spool produced so far is
/// released before the error is returned. If this future is dropped instead,
/// running batches are detached and release their own spools.
pub async fn spool_batches<'k>(
    ctx: &Context,
    batches: impl IntoIterator<Item = &'k [String]>,
) -> Result<Vec<Option<Spooled<MetadataRecord>>>> {
    let queries: Vec<KeyQuery> = batches
        .into_iter()
        .map(|keys| KeyQuery::new(keys.iter().cloned()).with_scope(ctx.options.repository.as_deref()))
        .collect();
    let batches = queries.len();
    // Tasks are spawned lazily, when the bounded join first polls a worker.
    let workers = queries.into_iter().enumerate().map(|(index, query)| {
        let (transport, spool) = (ctx.transport.clone(), ctx.spool.clone());
        async move {
            let task = async move { execute_batch(transport.as_ref(), &spool, index, &query).await };
            tokio::spawn(task.in_current_span())
                .await
                .or_raise(|| ErrorKind::Worker(index))
                .and_then(|spooled| spooled)
        }
    });

    match try_join_bounded(workers, ctx.options.workers.get()).await {
        Ok(spooled) => Ok(spooled),
        Err(Aborted { error, completed, suppressed }) => {
            tracing::warn!(batches, completed = completed.len(), error = %&*error, "Lookup aborted");
            for e in suppressed {
                tracing::debug!(error = %&*e, "Suppressed error from batch running at abort");
            }
            for mut spooled in completed.into_iter().flatten() {
                if let Err(e) = spooled.close() {
                    tracing::warn!(spool = %spooled.id(), error = %&*e, "Unable to release spool of aborted lookup");
                }
            }
            Err(error)
        },
    }
}
