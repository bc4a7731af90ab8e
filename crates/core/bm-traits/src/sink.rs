//! Reconciliation sink trait.

use async_trait::async_trait;
use bm_error::Result;
use bm_types::ReconciliationRecord;

/// Durable, append-only destination for reconciliation records.
///
/// A record counts as recorded only once [`record`](RecordSink::record)
/// returns `Ok`. Implementations serialize concurrent appends so rows never
/// interleave.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append one record and make it durable before returning.
    async fn record(&self, record: &ReconciliationRecord) -> Result<()>;

    /// Number of records appended through this sink.
    fn recorded(&self) -> u64;
}
