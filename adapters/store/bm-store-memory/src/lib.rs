//! bm-store-memory - in-memory object store for bucket-migrate.
//!
//! Buckets are `BTreeMap`s so listing order is lexicographic, like S3.
//! Faults can be scripted per key and per operation, listing can be made to
//! fail from a given page on, and the store tracks the highest number of
//! concurrent copy requests it has seen.

use async_trait::async_trait;
use bm_error::{StoreError, StoreResult};
use bm_traits::{ListPage, ListRequest, ObjectStore};
use bm_types::ObjectKey;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Default page size, matching S3's `MaxKeys` default.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// A scripted failure returned instead of performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `SlowDown` throttling
    Throttled,
    /// 503
    Unavailable,
    /// Request timeout
    Timeout,
    /// `NoSuchKey`
    NotFound,
    /// `AccessDenied`
    AccessDenied,
}

impl Fault {
    fn into_error(self, key: &str) -> StoreError {
        match self {
            Fault::Throttled => StoreError::Throttled(format!("SlowDown: {key}")),
            Fault::Unavailable => StoreError::Unavailable(format!("503 Service Unavailable: {key}")),
            Fault::Timeout => StoreError::Timeout(format!("request timed out: {key}")),
            Fault::NotFound => StoreError::NotFound(format!("NoSuchKey: {key}")),
            Fault::AccessDenied => StoreError::AccessDenied(format!("AccessDenied: {key}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operation {
    Copy,
    Get,
}

/// In-memory [`ObjectStore`].
#[derive(Debug)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, Bytes>>>,
    faults: Mutex<HashMap<(Operation, String), VecDeque<Fault>>>,
    listing_fault: Mutex<Option<(u64, Fault)>>,
    page_size: usize,
    server_side_copy: bool,
    copy_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    copy_calls: AtomicU64,
    list_calls: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            faults: Mutex::new(HashMap::new()),
            listing_fault: Mutex::new(None),
            page_size: DEFAULT_PAGE_SIZE,
            server_side_copy: true,
            copy_delay: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            copy_calls: AtomicU64::new(0),
            list_calls: AtomicU64::new(0),
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default page size used when a request has no `max_keys`.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Report server-side copy as unsupported.
    pub fn without_server_side_copy(mut self) -> Self {
        self.server_side_copy = false;
        self
    }

    /// Hold every copy request open for `delay`, so concurrency is observable.
    pub fn with_copy_delay(mut self, delay: Duration) -> Self {
        self.copy_delay = Some(delay);
        self
    }

    /// Store an object.
    pub fn put(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.buckets
            .lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.into());
    }

    /// Read an object back.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets.lock().get(bucket)?.get(key).cloned()
    }

    /// All keys of a bucket in listing order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Fail the next copies of `key` with these faults, in order.
    pub fn inject_copy_faults(&self, key: &str, faults: impl IntoIterator<Item = Fault>) {
        self.inject(Operation::Copy, key, faults);
    }

    /// Fail the next downloads of `key` with these faults, in order.
    pub fn inject_get_faults(&self, key: &str, faults: impl IntoIterator<Item = Fault>) {
        self.inject(Operation::Get, key, faults);
    }

    /// Fail every listing request for page `page` (0-based) and later.
    pub fn fail_listing_from_page(&self, page: u64, fault: Fault) {
        *self.listing_fault.lock() = Some((page, fault));
    }

    /// Highest number of concurrent copy requests observed.
    pub fn peak_concurrent_copies(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Total copy requests received, including failed ones.
    pub fn copy_calls(&self) -> u64 {
        self.copy_calls.load(Ordering::SeqCst)
    }

    /// Total listing requests received, including failed ones.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn inject(&self, op: Operation, key: &str, faults: impl IntoIterator<Item = Fault>) {
        self.faults
            .lock()
            .entry((op, key.to_string()))
            .or_default()
            .extend(faults);
    }

    fn next_fault(&self, op: Operation, key: &str) -> Option<Fault> {
        self.faults
            .lock()
            .get_mut(&(op, key.to_string()))
            .and_then(VecDeque::pop_front)
    }

    fn read(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let buckets = self.buckets.lock();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::NotFound(format!("NoSuchBucket: {bucket}")))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("NoSuchKey: {bucket}/{key}")))
    }
}

/// Page tokens are the index of the first key of the next page.
fn page_start(token: Option<&str>) -> StoreResult<usize> {
    match token {
        None => Ok(0),
        Some(t) => t
            .parse()
            .map_err(|_| StoreError::InvalidKey(format!("bad continuation token: {t}"))),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(&self, request: &ListRequest) -> StoreResult<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let start = page_start(request.continuation_token.as_deref())?;
        let page_size = request
            .max_keys
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.page_size);

        if let Some((from_page, fault)) = *self.listing_fault.lock() {
            if (start / page_size) as u64 >= from_page {
                return Err(fault.into_error(&request.bucket));
            }
        }

        let buckets = self.buckets.lock();
        let Some(objects) = buckets.get(&request.bucket) else {
            return Err(StoreError::NotFound(format!(
                "NoSuchBucket: {}",
                request.bucket
            )));
        };

        let matching: Vec<&String> = objects
            .keys()
            .filter(|k| {
                request
                    .prefix
                    .as_deref()
                    .is_none_or(|p| k.starts_with(p))
            })
            .collect();

        let end = (start + page_size).min(matching.len());
        let keys = matching
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|k| ObjectKey::from(k.as_str()))
            .collect();
        let next_token = (end < matching.len()).then(|| end.to_string());

        Ok(ListPage { keys, next_token })
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        dest_bucket: &str,
        key: &ObjectKey,
    ) -> StoreResult<()> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);

        if !self.server_side_copy {
            return Err(StoreError::CopyUnsupported("NotImplemented".to_string()));
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.copy_delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.next_fault(Operation::Copy, key.as_str()) {
            Some(fault) => Err(fault.into_error(key.as_str())),
            None => self
                .read(source_bucket, key.as_str())
                .map(|body| self.put(dest_bucket, key.as_str(), body)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_object(&self, bucket: &str, key: &ObjectKey) -> StoreResult<Bytes> {
        if let Some(fault) = self.next_fault(Operation::Get, key.as_str()) {
            return Err(fault.into_error(key.as_str()));
        }
        self.read(bucket, key.as_str())
    }

    async fn put_object(&self, bucket: &str, key: &ObjectKey, body: Bytes) -> StoreResult<()> {
        self.put(bucket, key.as_str(), body);
        Ok(())
    }

    fn supports_server_side_copy(&self) -> bool {
        self.server_side_copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(keys: &[&str]) -> MemoryStore {
        let store = MemoryStore::new().with_page_size(2);
        for key in keys {
            store.put("src", key, key.to_string());
        }
        store
    }

    #[tokio::test]
    async fn test_list_pages_in_order() {
        let store = store_with(&["c", "a", "b"]);

        let first = store.list_page(&ListRequest::new("src")).await.unwrap();
        assert_eq!(first.keys, vec![ObjectKey::from("a"), ObjectKey::from("b")]);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let second = store
            .list_page(&ListRequest::new("src").with_continuation_token(first.next_token))
            .await
            .unwrap();
        assert_eq!(second.keys, vec![ObjectKey::from("c")]);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_list_prefix() {
        let store = store_with(&["data/a", "data/b", "other/c"]);
        let page = store
            .list_page(
                &ListRequest::new("src")
                    .with_prefix(Some("data/".to_string()))
                    .with_max_keys(Some(10)),
            )
            .await
            .unwrap();
        assert_eq!(page.keys.len(), 2);
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_listing_fault_from_page() {
        let store = store_with(&["a", "b", "c"]);
        store.fail_listing_from_page(1, Fault::Unavailable);

        assert!(store.list_page(&ListRequest::new("src")).await.is_ok());
        let err = store
            .list_page(&ListRequest::new("src").with_continuation_token(Some("2".to_string())))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_copy_and_faults() {
        let store = store_with(&["a"]);
        store.inject_copy_faults("a", [Fault::Throttled]);

        let key = ObjectKey::from("a");
        assert!(matches!(
            store.copy_object("src", "dst", &key).await,
            Err(StoreError::Throttled(_))
        ));
        assert!(store.copy_object("src", "dst", &key).await.is_ok());
        assert_eq!(store.object("dst", "a").unwrap(), Bytes::from("a"));
        assert_eq!(store.copy_calls(), 2);
    }

    #[tokio::test]
    async fn test_copy_missing_key() {
        let store = store_with(&[]);
        let result = store.copy_object("src", "dst", &"nope".into()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_without_server_side_copy() {
        let store = store_with(&["a"]).without_server_side_copy();
        assert!(!store.supports_server_side_copy());
        assert!(matches!(
            store.copy_object("src", "dst", &"a".into()).await,
            Err(StoreError::CopyUnsupported(_))
        ));
    }
}
