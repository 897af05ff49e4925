use crate::error::{ErrorKind, Result};
use crate::models::MetadataRecord;
use crate::query::KeyQuery;
use crate::transport::{QueryTransport, SearchStream};
use depinfo_spool::{SpoolHandle, SpoolWriter, Spooled};
use exn::ResultExt;
use futures::StreamExt;
use std::time::Instant;
use tracing::instrument;

/// Run the query for one batch and spool every record it returns.
///
/// `index` is the batch's position in batch order and is only used to
/// identify it in errors and logs. A batch that matched nothing produces no
/// spool (`None`).
///
/// On failure nothing is returned but the error: the partially written spool
/// is released here, so a failed batch never leaks storage.
#[instrument(level = "debug", skip_all, fields(batch = index, keys = query.keys().len()))]
pub async fn execute_batch(
    transport: &dyn QueryTransport,
    spool: &SpoolHandle,
    index: usize,
    query: &KeyQuery,
) -> Result<Option<Spooled<MetadataRecord>>> {
    let start = Instant::now();
    let mut writer = SpoolWriter::create(spool).await.or_raise(|| ErrorKind::Spool)?;
    if let Err(e) = drain(transport.search(query), &mut writer, index).await {
        discard(writer);
        return Err(e);
    }
    let records = writer.len();
    tracing::debug!(
        transport = transport.name(),
        scope = query.scope().unwrap_or_default(),
        records,
        elapsed = ?start.elapsed(),
        "Finished searching batch"
    );
    if writer.is_empty() {
        discard(writer);
        return Ok(None);
    }
    Ok(Some(writer.finish().await.or_raise(|| ErrorKind::Spool)?))
}

async fn drain(mut records: SearchStream<'_>, writer: &mut SpoolWriter<MetadataRecord>, index: usize) -> Result<()> {
    while let Some(record) = records.next().await {
        let record = record.or_raise(|| ErrorKind::Query(index))?;
        writer.write(&record).await.or_raise(|| ErrorKind::Spool)?;
    }
    Ok(())
}

fn discard(writer: SpoolWriter<MetadataRecord>) {
    let spool = writer.id().clone();
    if let Err(e) = writer.abort() {
        tracing::warn!(%spool, error = %&*e, "Unable to release discarded spool");
    }
}
