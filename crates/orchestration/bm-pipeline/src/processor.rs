//! Per-key work performed by pool workers.

use crate::client::RetryingClient;
use async_trait::async_trait;
use bm_types::{CopyOutcome, ObjectKey, ReconciliationRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// Work done for one key by one worker.
///
/// `process` never fails: every error becomes a failure outcome so a bad key
/// cannot take down its siblings.
#[async_trait]
pub trait KeyProcessor: Send + Sync {
    /// Process one key to a terminal outcome.
    async fn process(&self, key: ObjectKey) -> ReconciliationRecord;

    /// Outcome for a key whose work was lost (e.g. the worker panicked).
    fn lost(&self, key: ObjectKey, reason: &str) -> ReconciliationRecord;
}

/// Copies each key from the source bucket to the destination bucket.
#[derive(Debug, Clone)]
pub struct DirectCopyProcessor {
    client: Arc<RetryingClient>,
    source_bucket: String,
    dest_bucket: String,
}

impl DirectCopyProcessor {
    /// Create a processor copying `source_bucket` into `dest_bucket`.
    pub fn new(
        client: Arc<RetryingClient>,
        source_bucket: impl Into<String>,
        dest_bucket: impl Into<String>,
    ) -> Self {
        Self {
            client,
            source_bucket: source_bucket.into(),
            dest_bucket: dest_bucket.into(),
        }
    }
}

#[async_trait]
impl KeyProcessor for DirectCopyProcessor {
    async fn process(&self, key: ObjectKey) -> ReconciliationRecord {
        let copied = self
            .client
            .copy(&self.source_bucket, &self.dest_bucket, &key)
            .await;

        let outcome = match copied.result {
            Ok(method) => {
                info!(key = %key, attempts = copied.attempts, method = ?method, "Copied");
                CopyOutcome::success(key, copied.attempts)
            }
            Err(e) => {
                warn!(key = %key, attempts = copied.attempts, error = %e, "Copy failed");
                CopyOutcome::failure(key, e.reason(), copied.attempts)
            }
        };

        outcome.into()
    }

    fn lost(&self, key: ObjectKey, reason: &str) -> ReconciliationRecord {
        CopyOutcome::failure(key, reason, 1).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use bm_store_memory::{Fault, MemoryStore};
    use bm_types::CopyStatus;

    fn processor(store: Arc<MemoryStore>) -> DirectCopyProcessor {
        let retry = RetryConfig::new()
            .with_max_retries(3)
            .with_initial_backoff_ms(1)
            .with_jitter(false);
        DirectCopyProcessor::new(Arc::new(RetryingClient::new(store, retry)), "src", "dst")
    }

    #[tokio::test]
    async fn test_copy_success() {
        let store = Arc::new(MemoryStore::new());
        store.put("src", "a.txt", "a");

        let record = processor(store.clone()).process("a.txt".into()).await;

        assert_eq!(
            record,
            ReconciliationRecord::Copy(CopyOutcome::success("a.txt".into(), 1))
        );
        assert!(store.object("dst", "a.txt").is_some());
    }

    #[tokio::test]
    async fn test_permanent_failure_reason() {
        let store = Arc::new(MemoryStore::new());

        let record = processor(store).process("missing.txt".into()).await;

        let ReconciliationRecord::Copy(outcome) = record else {
            panic!("expected copy record");
        };
        assert_eq!(outcome.status, CopyStatus::Failure("not found".to_string()));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_failure() {
        let store = Arc::new(MemoryStore::new());
        store.put("src", "busy.txt", "x");
        store.inject_copy_faults("busy.txt", [Fault::Throttled; 4]);

        let record = processor(store).process("busy.txt".into()).await;

        let ReconciliationRecord::Copy(outcome) = record else {
            panic!("expected copy record");
        };
        assert_eq!(outcome.status, CopyStatus::Failure("throttled".to_string()));
        assert_eq!(outcome.attempts, 4);
    }
}
