//! Store client with a retry budget.

use crate::retry::{Attempted, RetryConfig, with_retry};
use bm_error::StoreError;
use bm_traits::{ListPage, ListRequest, ObjectStore};
use bm_types::ObjectKey;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

/// How an object reached the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    /// Copied inside the store
    ServerSide,
    /// Downloaded and re-uploaded through this process
    StreamThrough,
}

/// Wraps an [`ObjectStore`] and retries transient failures.
///
/// This is the only place retry happens. Workers see the final result and
/// the number of attempts it took.
#[derive(Clone)]
pub struct RetryingClient {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
}

impl RetryingClient {
    /// Create a client around `store`.
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Fetch one listing page.
    pub async fn list_page(&self, request: &ListRequest) -> Attempted<ListPage> {
        with_retry(&self.retry, "list_objects", || self.store.list_page(request)).await
    }

    /// Download an object.
    pub async fn get(&self, bucket: &str, key: &ObjectKey) -> Attempted<Bytes> {
        with_retry(&self.retry, "get_object", || self.store.get_object(bucket, key)).await
    }

    /// Upload an object.
    pub async fn put(&self, bucket: &str, key: &ObjectKey, body: Bytes) -> Attempted<()> {
        with_retry(&self.retry, "put_object", || {
            self.store.put_object(bucket, key, body.clone())
        })
        .await
    }

    /// Copy `key` between buckets.
    ///
    /// Uses server-side copy when the store offers it and falls back to
    /// download + upload when it does not. Attempts of both phases are summed.
    pub async fn copy(
        &self,
        source_bucket: &str,
        dest_bucket: &str,
        key: &ObjectKey,
    ) -> Attempted<CopyMethod> {
        let mut attempts = 0;

        if self.store.supports_server_side_copy() {
            let copied = with_retry(&self.retry, "copy_object", || {
                self.store.copy_object(source_bucket, dest_bucket, key)
            })
            .await;

            match copied.result {
                Err(StoreError::CopyUnsupported(reason)) => {
                    debug!(key = %key, reason = %reason, "Server-side copy unavailable, streaming through");
                    attempts += copied.attempts;
                }
                result => {
                    return Attempted {
                        result: result.map(|()| CopyMethod::ServerSide),
                        attempts: copied.attempts,
                    };
                }
            }
        }

        let downloaded = self.get(source_bucket, key).await;
        attempts += downloaded.attempts;
        let body = match downloaded.result {
            Ok(body) => body,
            Err(e) => {
                return Attempted {
                    result: Err(e),
                    attempts,
                };
            }
        };

        let uploaded = self.put(dest_bucket, key, body).await;
        Attempted {
            result: uploaded.result.map(|()| CopyMethod::StreamThrough),
            attempts: attempts + uploaded.attempts,
        }
    }
}

impl std::fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
