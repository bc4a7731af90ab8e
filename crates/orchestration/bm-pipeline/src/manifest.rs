//! Manifest expansion: each listed key is a file of object keys.

use crate::client::RetryingClient;
use crate::processor::KeyProcessor;
use async_trait::async_trait;
use bm_types::{ManifestOutcome, ObjectKey, ReconciliationRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches a manifest, fetches every object it lists, then forwards the
/// manifest to the destination bucket.
///
/// Referenced objects are fetched one after another inside the worker; the
/// pool's capacity bounds how many manifests are expanded at once.
#[derive(Debug, Clone)]
pub struct ManifestProcessor {
    client: Arc<RetryingClient>,
    source_bucket: String,
    dest_bucket: String,
    objects_bucket: String,
}

impl ManifestProcessor {
    /// Create a manifest processor.
    pub fn new(
        client: Arc<RetryingClient>,
        source_bucket: impl Into<String>,
        dest_bucket: impl Into<String>,
        objects_bucket: impl Into<String>,
    ) -> Self {
        Self {
            client,
            source_bucket: source_bucket.into(),
            dest_bucket: dest_bucket.into(),
            objects_bucket: objects_bucket.into(),
        }
    }
}

/// Object keys listed in a manifest body, one per line.
///
/// Only the line terminator (`\n` or `\r\n`) is stripped; keys may carry
/// leading or trailing spaces. Blank lines are kept so the count matches the
/// manifest's line count.
pub fn parse_manifest(body: &str) -> Vec<ObjectKey> {
    body.lines().map(ObjectKey::from).collect()
}

fn retries_of(attempts: u32) -> u64 {
    u64::from(attempts.saturating_sub(1))
}

#[async_trait]
impl KeyProcessor for ManifestProcessor {
    async fn process(&self, key: ObjectKey) -> ReconciliationRecord {
        let fetched = self.client.get(&self.source_bucket, &key).await;
        let body = match fetched.result {
            Ok(body) => body,
            Err(e) => {
                warn!(key = %key, attempts = fetched.attempts, error = %e, "Manifest fetch failed");
                return ManifestOutcome::failed(key, 0, 0, e.reason(), fetched.attempts).into();
            }
        };

        let object_keys = parse_manifest(&String::from_utf8_lossy(&body));
        let total_lines = object_keys.len() as u64;
        let mut successful_downloads = 0u64;
        let mut retries = retries_of(fetched.attempts);

        for object_key in &object_keys {
            if object_key.as_str().is_empty() {
                debug!(manifest = %key, "Blank manifest line");
                continue;
            }
            let download = self.client.get(&self.objects_bucket, object_key).await;
            retries += retries_of(download.attempts);
            match download.result {
                Ok(bytes) => {
                    successful_downloads += 1;
                    debug!(manifest = %key, object = %object_key, bytes = bytes.len(), "Fetched object");
                }
                Err(e) => {
                    warn!(manifest = %key, object = %object_key, error = %e, "Object fetch failed");
                }
            }
        }

        let forwarded = self.client.put(&self.dest_bucket, &key, body).await;
        retries += retries_of(forwarded.attempts);
        let outcome = match forwarded.result {
            Ok(()) => {
                info!(
                    key = %key,
                    total_lines,
                    successful_downloads,
                    "Processed manifest"
                );
                ManifestOutcome::completed(key, total_lines, successful_downloads, forwarded.attempts)
            }
            Err(e) => {
                warn!(key = %key, attempts = forwarded.attempts, error = %e, "Manifest upload failed");
                ManifestOutcome::failed(
                    key,
                    total_lines,
                    successful_downloads,
                    e.reason(),
                    forwarded.attempts,
                )
            }
        };

        outcome.with_retries(retries).into()
    }

    fn lost(&self, key: ObjectKey, reason: &str) -> ReconciliationRecord {
        ManifestOutcome::failed(key, 0, 0, reason, 1).into()
    }
}
