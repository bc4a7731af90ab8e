//! Object keys and listing pages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one object within a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create a key from anything string-like.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ObjectKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// One page of keys returned by a single listing call.
///
/// Key order follows the store's listing order; it says nothing about
/// the order in which copies of those keys complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based position of this page in the listing
    pub index: u64,

    /// Keys in listing order
    pub keys: Vec<ObjectKey>,
}

impl Page {
    /// Create a page.
    pub fn new(index: u64, keys: Vec<ObjectKey>) -> Self {
        Self { index, keys }
    }

    /// Number of keys in the page.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the page holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
