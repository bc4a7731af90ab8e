//! Terminal outcomes for processed keys.

use crate::ObjectKey;
use serde::{Deserialize, Serialize};

/// Final status of the work for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason")]
pub enum CopyStatus {
    /// The object reached the destination
    Success,

    /// Work stopped with a permanent error or an exhausted retry budget
    Failure(String),
}

impl CopyStatus {
    /// Whether this is [`CopyStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, CopyStatus::Success)
    }

    /// Failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            CopyStatus::Success => None,
            CopyStatus::Failure(reason) => Some(reason),
        }
    }
}

/// Result of copying one key, created exactly once when its work terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOutcome {
    /// The key that was copied
    pub key: ObjectKey,

    /// Success or failure with reason
    pub status: CopyStatus,

    /// Remote attempts made, always at least 1
    pub attempts: u32,
}

impl CopyOutcome {
    /// Successful copy after `attempts` tries.
    pub fn success(key: ObjectKey, attempts: u32) -> Self {
        Self {
            key,
            status: CopyStatus::Success,
            attempts: attempts.max(1),
        }
    }

    /// Failed copy after `attempts` tries.
    pub fn failure(key: ObjectKey, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            key,
            status: CopyStatus::Failure(reason.into()),
            attempts: attempts.max(1),
        }
    }

    /// Whether the copy succeeded.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of processing one manifest file in manifest-expansion mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestOutcome {
    /// Key of the manifest file in the source bucket
    pub file_key: ObjectKey,

    /// Lines in the manifest, blank ones included
    pub total_lines: u64,

    /// Referenced objects fetched successfully
    pub successful_downloads: u64,

    /// Whether the manifest itself was fetched and forwarded
    pub status: CopyStatus,

    /// Attempts spent forwarding the manifest (or fetching it, if that failed)
    pub attempts: u32,

    /// Retries spent across every request made for this manifest
    pub retries: u64,
}

impl ManifestOutcome {
    /// Manifest fetched, expanded, and forwarded.
    pub fn completed(
        file_key: ObjectKey,
        total_lines: u64,
        successful_downloads: u64,
        attempts: u32,
    ) -> Self {
        Self {
            file_key,
            total_lines,
            successful_downloads,
            status: CopyStatus::Success,
            attempts: attempts.max(1),
            retries: u64::from(attempts.saturating_sub(1)),
        }
    }

    /// Manifest processing stopped early with a reason.
    pub fn failed(
        file_key: ObjectKey,
        total_lines: u64,
        successful_downloads: u64,
        reason: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            file_key,
            total_lines,
            successful_downloads,
            status: CopyStatus::Failure(reason.into()),
            attempts: attempts.max(1),
            retries: u64::from(attempts.saturating_sub(1)),
        }
    }

    /// Replace the retry count with the total over every request.
    pub fn with_retries(mut self, retries: u64) -> Self {
        self.retries = retries;
        self
    }

    /// Whether the manifest was forwarded.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
