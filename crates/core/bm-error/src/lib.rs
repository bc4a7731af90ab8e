//! Error types and classification for bucket-migrate.
//!
//! This crate provides:
//! - [`BmError`] - Top-level error enum for all migration errors
//! - Domain-specific errors ([`StoreError`], [`ListingError`], [`RecorderError`])
//! - [`ErrorCategory`] for retry decision making
//! - Classification of raw remote error text

use thiserror::Error;

/// Top-level error type for bucket-migrate.
#[derive(Error, Debug)]
pub enum BmError {
    /// Listing the source bucket failed after the retry budget was exhausted.
    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),

    /// Reconciliation log I/O failed
    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors returned by a remote object store for a single request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Object or bucket does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks permission
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Key or request rejected as malformed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Request rate exceeded (SlowDown, 429)
    #[error("Throttled: {0}")]
    Throttled(String),

    /// Request timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Service-side 5xx failure
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The backend has no server-side copy
    #[error("Server-side copy not supported: {0}")]
    CopyUnsupported(String),

    /// Anything the adapter could not map
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Retry category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::NotFound(_) => ErrorCategory::Permanent,
            StoreError::AccessDenied(_) => ErrorCategory::Permanent,
            StoreError::InvalidKey(_) => ErrorCategory::Permanent,
            StoreError::CopyUnsupported(_) => ErrorCategory::Permanent,
            StoreError::Throttled(_) => ErrorCategory::Transient,
            StoreError::Timeout(_) => ErrorCategory::Transient,
            StoreError::Unavailable(_) => ErrorCategory::Transient,
            StoreError::Network(_) => ErrorCategory::Transient,
            StoreError::Other(msg) => classify_message(msg),
        }
    }

    /// Whether the error is worth retrying.
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Short, stable reason written to the reconciliation log.
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not found",
            StoreError::AccessDenied(_) => "access denied",
            StoreError::InvalidKey(_) => "invalid key",
            StoreError::Throttled(_) => "throttled",
            StoreError::Timeout(_) => "timeout",
            StoreError::Unavailable(_) => "service unavailable",
            StoreError::Network(_) => "network error",
            StoreError::CopyUnsupported(_) => "copy unsupported",
            StoreError::Other(_) => "remote error",
        }
    }
}

/// Listing failure that aborts the run.
#[derive(Error, Debug)]
#[error("listing {bucket} failed at page {page} after {attempts} attempt(s): {source}")]
pub struct ListingError {
    /// Bucket being listed
    pub bucket: String,

    /// Zero-based index of the page that could not be fetched
    pub page: u64,

    /// Attempts made for that page
    pub attempts: u32,

    /// Last error returned by the store
    #[source]
    pub source: StoreError,
}

/// Reconciliation log errors.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Opening or creating the log failed
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },

    /// Appending or syncing a row failed
    #[error("Failed to append to {path}: {message}")]
    Append { path: String, message: String },

    /// Existing log could not be parsed during resume
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },
}

/// Error classification for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - retry with exponential backoff
    ///
    /// Examples: throttling, timeout, 5xx
    Transient,

    /// Permanent error - never retry
    ///
    /// Examples: not found, access denied, malformed key
    Permanent,
}

/// Classify raw remote error text.
///
/// Retryable: throttling (SlowDown, TooManyRequests), 5xx, timeouts, connection resets.
/// Non-retryable: NoSuchKey, NoSuchBucket, AccessDenied, InvalidRequest, other 4xx.
/// Unknown errors are treated as retryable.
pub fn classify_message(error: &str) -> ErrorCategory {
    let error_lower = error.to_lowercase();

    if error_lower.contains("slowdown")
        || error_lower.contains("toomanyrequests")
        || error_lower.contains("throttl")
        || error_lower.contains("service unavailable")
        || error_lower.contains("internalerror")
        || error_lower.contains("500")
        || error_lower.contains("502")
        || error_lower.contains("503")
        || error_lower.contains("504")
        || error_lower.contains("timeout")
        || error_lower.contains("timed out")
        || error_lower.contains("connection reset")
        || error_lower.contains("connection refused")
    {
        return ErrorCategory::Transient;
    }

    if error_lower.contains("nosuchkey")
        || error_lower.contains("nosuchbucket")
        || error_lower.contains("accessdenied")
        || error_lower.contains("invalidrequest")
        || error_lower.contains("403")
        || error_lower.contains("404")
        || error_lower.contains("400")
    {
        return ErrorCategory::Permanent;
    }

    ErrorCategory::Transient
}

/// Result type alias using BmError.
pub type Result<T> = std::result::Result<T, BmError>;

/// Result of a single remote store request.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
