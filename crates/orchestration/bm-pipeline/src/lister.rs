//! Paginated key listing.

use crate::client::RetryingClient;
use async_stream::try_stream;
use bm_error::{BmError, ListingError, Result};
use bm_traits::ListRequest;
use bm_types::{ObjectKey, Page};
use futures::Stream;
use std::sync::Arc;
use tracing::debug;

/// Lists a bucket one page at a time.
#[derive(Debug, Clone)]
pub struct KeyLister {
    client: Arc<RetryingClient>,
    bucket: String,
    prefix: Option<String>,
    page_size: Option<i32>,
}

impl KeyLister {
    /// Create a lister for `bucket`.
    pub fn new(client: Arc<RetryingClient>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: None,
            page_size: None,
        }
    }

    /// Restrict listing to a prefix.
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Set the number of keys requested per page.
    pub fn with_page_size(mut self, page_size: Option<i32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Stream pages in the store's listing order.
    ///
    /// Pages are fetched lazily: the next listing call happens only when the
    /// consumer polls for the next page. Directory markers (keys ending with
    /// `/`) are objects like any other and are kept; only empty keys are
    /// dropped. A page that still fails once the
    /// client's retry budget is spent ends the stream with
    /// [`BmError::Listing`].
    pub fn pages(&self) -> impl Stream<Item = Result<Page>> + '_ {
        try_stream! {
            let mut continuation_token: Option<String> = None;
            let mut index: u64 = 0;

            loop {
                let request = ListRequest::new(&self.bucket)
                    .with_prefix(self.prefix.clone())
                    .with_max_keys(self.page_size)
                    .with_continuation_token(continuation_token.take());

                let listed = self.client.list_page(&request).await;
                let attempts = listed.attempts;
                let page = listed.result.map_err(|source| {
                    BmError::Listing(ListingError {
                        bucket: self.bucket.clone(),
                        page: index,
                        attempts,
                        source,
                    })
                })?;

                let keys: Vec<ObjectKey> = page
                    .keys
                    .into_iter()
                    .filter(|k| !k.as_str().is_empty())
                    .collect();

                debug!(
                    bucket = %self.bucket,
                    page = index,
                    keys = keys.len(),
                    more = page.next_token.is_some(),
                    "Listed page"
                );

                yield Page::new(index, keys);
                index += 1;

                match page.next_token {
                    Some(token) => continuation_token = Some(token),
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use bm_store_memory::{Fault, MemoryStore};
    use futures::{StreamExt, pin_mut};

    fn lister(store: Arc<MemoryStore>) -> KeyLister {
        let retry = RetryConfig::new()
            .with_max_retries(2)
            .with_initial_backoff_ms(1)
            .with_jitter(false);
        KeyLister::new(Arc::new(RetryingClient::new(store, retry)), "src")
    }

    #[tokio::test]
    async fn test_pages_in_order() {
        let store = Arc::new(MemoryStore::new().with_page_size(2));
        for key in ["a", "b", "c", "d", "e"] {
            store.put("src", key, "x");
        }

        let lister = lister(store.clone());
        let pages: Vec<Page> = lister
            .pages()
            .map(|p| p.unwrap())
            .collect()
            .await;

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].index, 0);
        assert_eq!(pages[0].keys, vec![ObjectKey::from("a"), ObjectKey::from("b")]);
        assert_eq!(pages[2].keys, vec![ObjectKey::from("e")]);
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_pages_are_lazy() {
        let store = Arc::new(MemoryStore::new().with_page_size(1));
        for key in ["a", "b", "c"] {
            store.put("src", key, "x");
        }

        let lister = lister(store.clone());
        let stream = lister.pages();
        pin_mut!(stream);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.keys, vec![ObjectKey::from("a")]);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_keeps_directory_markers() {
        let store = Arc::new(MemoryStore::new());
        store.put("src", "dir/", "");
        store.put("src", "dir/file.txt", "x");

        let lister = lister(store);
        let pages: Vec<Page> = lister.pages().map(|p| p.unwrap()).collect().await;

        assert_eq!(pages.len(), 1);
        assert_eq!(
            pages[0].keys,
            vec![ObjectKey::from("dir/"), ObjectKey::from("dir/file.txt")]
        );
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let store = Arc::new(MemoryStore::new().with_page_size(1));
        for key in ["a", "b", "c"] {
            store.put("src", key, "x");
        }
        store.fail_listing_from_page(1, Fault::Unavailable);

        let lister = lister(store);
        let results: Vec<Result<Page>> = lister.pages().collect().await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(BmError::Listing(e)) => {
                assert_eq!(e.page, 1);
                assert_eq!(e.attempts, 3);
            }
            other => panic!("expected listing error, got {other:?}"),
        }
    }
}
