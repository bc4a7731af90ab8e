//! Configuration types for a migration run.

use crate::retry::RetryConfig;
use bm_types::RecordFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Largest page S3 will return for one listing call.
pub const MAX_PAGE_SIZE: i32 = 1000;

/// What the pipeline does with each listed key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MigrationMode {
    /// Copy each key from the source bucket to the destination bucket
    Direct,

    /// Treat each key as a manifest of object keys in `objects_bucket`:
    /// fetch every referenced object, then forward the manifest
    Manifest {
        /// Bucket holding the objects the manifests reference
        objects_bucket: String,
    },
}

impl MigrationMode {
    /// Reconciliation log layout for this mode.
    pub fn record_format(&self) -> RecordFormat {
        match self {
            MigrationMode::Direct => RecordFormat::Direct,
            MigrationMode::Manifest { .. } => RecordFormat::Manifest,
        }
    }
}

/// Configuration for a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bucket to list and copy from
    pub source_bucket: String,

    /// Bucket to copy into
    pub dest_bucket: String,

    /// Optional key prefix to restrict listing
    pub prefix: Option<String>,

    /// Maximum concurrent copies (worker pool capacity)
    pub capacity: usize,

    /// Reconciliation log path
    pub recon_path: PathBuf,

    /// Direct copy or manifest expansion
    pub mode: MigrationMode,

    /// Skip keys already recorded in an existing reconciliation log
    pub resume: bool,

    /// Keys per listing request (store default if `None`)
    pub page_size: Option<i32>,

    /// Stop admitting keys after this many (0 = unlimited)
    pub max_keys: usize,

    /// Retry budget for remote requests
    pub retry: RetryConfig,

    /// How long to wait for workers to exit after the last page
    #[serde(with = "duration_secs")]
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_bucket: String::new(),
            dest_bucket: String::new(),
            prefix: None,
            capacity: num_cpus(),
            recon_path: PathBuf::from("reconciliation.csv"),
            mode: MigrationMode::Direct,
            resume: false,
            page_size: None,
            max_keys: 0,
            retry: RetryConfig::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Create a configuration for copying `source_bucket` into `dest_bucket`.
    pub fn new(source_bucket: impl Into<String>, dest_bucket: impl Into<String>) -> Self {
        Self {
            source_bucket: source_bucket.into(),
            dest_bucket: dest_bucket.into(),
            ..Default::default()
        }
    }

    /// Restrict listing to a key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the worker pool capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the reconciliation log path.
    pub fn with_recon_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.recon_path = path.into();
        self
    }

    /// Set the migration mode.
    pub fn with_mode(mut self, mode: MigrationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Skip keys already present in the reconciliation log.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Set the listing page size.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Stop after admitting `max_keys` keys.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Set the retry budget.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the worker shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_bucket.is_empty() {
            return Err("source bucket must be set".to_string());
        }
        if self.dest_bucket.is_empty() {
            return Err("destination bucket must be set".to_string());
        }
        if self.capacity == 0 {
            return Err("capacity must be at least 1".to_string());
        }
        if let Some(size) = self.page_size {
            if !(1..=MAX_PAGE_SIZE).contains(&size) {
                return Err(format!("page_size must be in 1..={MAX_PAGE_SIZE}"));
            }
        }
        if let MigrationMode::Manifest { objects_bucket } = &self.mode {
            if objects_bucket.is_empty() {
                return Err("manifest mode needs an objects bucket".to_string());
            }
        }
        if self.source_bucket == self.dest_bucket && self.mode == MigrationMode::Direct {
            return Err("source and destination bucket must differ".to_string());
        }
        Ok(())
    }
}

/// Get the number of available CPUs.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Serde helper for Duration serialization.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
