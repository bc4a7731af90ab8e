//! bm-pipeline - Page-at-a-time bucket migration pipeline.
//!
//! This crate copies every object of a source bucket into a destination
//! bucket and keeps a durable record of what happened to each key:
//!
//! - Lazy, paginated key listing
//! - A bounded worker pool: at most `capacity` keys in flight, per-key failure isolation
//! - Retry with exponential backoff on transient store errors
//! - Server-side copy with a download-and-upload fallback
//! - An append-only CSV reconciliation log, synced after every row
//! - Optional manifest expansion and resume from an existing log
//!
//! # Example
//!
//! ```ignore
//! use bm_pipeline::{CancellationFlag, PipelineConfig, migrate};
//!
//! let config = PipelineConfig::new("source-bucket", "dest-bucket")
//!     .with_capacity(8)
//!     .with_recon_path("reconciliation.csv");
//!
//! let stats = migrate(config, store, CancellationFlag::new()).await?;
//! eprintln!("{} copied, {} failed", stats.keys_succeeded, stats.keys_failed);
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod lister;
pub mod manifest;
pub mod orchestrator;
pub mod pool;
pub mod processor;
pub mod recorder;
pub mod retry;
pub mod stats;

pub use cancel::CancellationFlag;
pub use client::{CopyMethod, RetryingClient};
pub use config::{MAX_PAGE_SIZE, MigrationMode, PipelineConfig};
pub use lister::KeyLister;
pub use manifest::{ManifestProcessor, parse_manifest};
pub use orchestrator::{Orchestrator, PipelineState, migrate, migrate_with_stats};
pub use pool::{CopyWorkerPool, PageBatch, PageResult};
pub use processor::{DirectCopyProcessor, KeyProcessor};
pub use recorder::{ReconciliationRecorder, completed_keys};
pub use retry::{Attempted, RetryConfig, with_retry};
pub use stats::{MigrationStats, StatsSnapshot};
