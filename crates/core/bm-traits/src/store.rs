//! Remote object store trait and related types.

use async_trait::async_trait;
use bm_error::StoreResult;
use bm_types::ObjectKey;
use bytes::Bytes;

/// Trait for remote object store backends.
///
/// Every method performs exactly one remote request. Retry and back-off
/// are layered on top by the caller, which is what lets the pipeline report
/// how many attempts a key took.
///
/// Implementations must be safe to share between concurrent workers.
///
/// # Implementations
///
/// - S3 (and S3-compatible endpoints such as LocalStack)
/// - In-memory store with fault injection (testing)
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one listing page.
    async fn list_page(&self, request: &ListRequest) -> StoreResult<ListPage>;

    /// Copy `key` from `source_bucket` to the same key in `dest_bucket`
    /// without moving bytes through this process.
    ///
    /// Backends lacking server-side copy return
    /// [`StoreError::CopyUnsupported`](bm_error::StoreError::CopyUnsupported).
    async fn copy_object(
        &self,
        source_bucket: &str,
        dest_bucket: &str,
        key: &ObjectKey,
    ) -> StoreResult<()>;

    /// Download an object body.
    async fn get_object(&self, bucket: &str, key: &ObjectKey) -> StoreResult<Bytes>;

    /// Upload an object body, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &ObjectKey, body: Bytes) -> StoreResult<()>;

    /// Whether [`copy_object`](ObjectStore::copy_object) is available at all.
    fn supports_server_side_copy(&self) -> bool {
        true
    }
}

/// Parameters for one listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Bucket to list
    pub bucket: String,

    /// Optional key prefix
    pub prefix: Option<String>,

    /// Token returned by the previous page, `None` for the first page
    pub continuation_token: Option<String>,

    /// Maximum keys per page (backend default if `None`)
    pub max_keys: Option<i32>,
}

impl ListRequest {
    /// Request the first page of `bucket`.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Restrict listing to a prefix.
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Set the page size.
    pub fn with_max_keys(mut self, max_keys: Option<i32>) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Continue from a previous page.
    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// Keys returned by one listing call plus the token for the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in listing order
    pub keys: Vec<ObjectKey>,

    /// Continuation token, `None` when the listing is exhausted
    pub next_token: Option<String>,
}
