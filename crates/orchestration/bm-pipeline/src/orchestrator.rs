//! Page-at-a-time migration driver.

use crate::cancel::CancellationFlag;
use crate::client::RetryingClient;
use crate::config::{MigrationMode, PipelineConfig};
use crate::lister::KeyLister;
use crate::manifest::ManifestProcessor;
use crate::pool::CopyWorkerPool;
use crate::processor::{DirectCopyProcessor, KeyProcessor};
use crate::recorder::{ReconciliationRecorder, completed_keys};
use crate::stats::{MigrationStats, StatsSnapshot};
use bm_error::{BmError, Result};
use bm_traits::{ObjectStore, RecordSink};
use bm_types::ObjectKey;
use futures::{StreamExt, pin_mut};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where the orchestrator is in its page cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Not started
    Idle,
    /// Waiting for the next page
    Listing,
    /// Handing the page's keys to the pool
    Dispatching,
    /// Waiting for every dispatched key to finish
    Draining,
    /// Appending the page's outcomes to the log
    Recording,
    /// Stopped (exhausted, interrupted, or failed)
    Done,
}

/// Drives listing, dispatch, drain and recording one page at a time.
///
/// Only the current page's keys are held in memory. All records for page N
/// are written before page N+1 is listed.
pub struct Orchestrator {
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn RecordSink>,
    cancel: CancellationFlag,
    completed: HashSet<ObjectKey>,
    stats: Arc<MigrationStats>,
    state: PipelineState,
}

impl Orchestrator {
    /// Create an orchestrator over `store`, writing outcomes to `sink`.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            config,
            store,
            sink,
            cancel: CancellationFlag::new(),
            completed: HashSet::new(),
            stats: Arc::new(MigrationStats::new()),
            state: PipelineState::Idle,
        }
    }

    /// Use an externally controlled cancellation flag.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Keys to skip because a previous run already recorded them.
    pub fn with_completed_keys(mut self, completed: HashSet<ObjectKey>) -> Self {
        self.completed = completed;
        self
    }

    /// Report into caller-owned statistics.
    pub fn with_stats(mut self, stats: Arc<MigrationStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Live statistics, shared with progress reporters.
    pub fn stats(&self) -> &Arc<MigrationStats> {
        &self.stats
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run until the listing is exhausted, the run is interrupted, or a
    /// fatal listing or recorder error occurs.
    ///
    /// Per-key failures never make this return an error.
    pub async fn run(&mut self) -> Result<StatsSnapshot> {
        self.config.validate().map_err(BmError::Config)?;

        info!(
            source = %self.config.source_bucket,
            destination = %self.config.dest_bucket,
            capacity = self.config.capacity,
            mode = ?self.config.mode,
            skip = self.completed.len(),
            "Starting migration"
        );

        let client = Arc::new(RetryingClient::new(
            self.store.clone(),
            self.config.retry.clone(),
        ));
        let processor: Arc<dyn KeyProcessor> = match &self.config.mode {
            MigrationMode::Direct => Arc::new(DirectCopyProcessor::new(
                client.clone(),
                &self.config.source_bucket,
                &self.config.dest_bucket,
            )),
            MigrationMode::Manifest { objects_bucket } => Arc::new(ManifestProcessor::new(
                client.clone(),
                &self.config.source_bucket,
                &self.config.dest_bucket,
                objects_bucket,
            )),
        };
        let lister = KeyLister::new(client, &self.config.source_bucket)
            .with_prefix(self.config.prefix.clone())
            .with_page_size(self.config.page_size);
        let pool = CopyWorkerPool::new(self.config.capacity, processor, self.stats.clone());

        let result = self.process_pages(&lister, &pool).await;

        pool.shutdown(self.config.shutdown_timeout).await;
        self.state = PipelineState::Done;
        self.stats.complete();

        let mut snapshot = self.stats.snapshot();
        snapshot.interrupted = self.cancel.is_cancelled();

        if let Err(e) = result {
            error!(
                error = %e,
                recorded = snapshot.keys_recorded(),
                "Migration aborted"
            );
            return Err(e);
        }

        info!(
            pages = snapshot.pages_listed,
            succeeded = snapshot.keys_succeeded,
            failed = snapshot.keys_failed,
            skipped = snapshot.keys_skipped,
            interrupted = snapshot.interrupted,
            "Migration finished"
        );
        Ok(snapshot)
    }

    async fn process_pages(&mut self, lister: &KeyLister, pool: &CopyWorkerPool) -> Result<()> {
        let pages = lister.pages();
        pin_mut!(pages);

        let limit = (self.config.max_keys > 0).then_some(self.config.max_keys);
        let mut admitted = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                info!("Interrupted, not listing further pages");
                break;
            }
            if limit.is_some_and(|max| admitted >= max) {
                info!(max_keys = admitted, "Key limit reached");
                break;
            }

            self.state = PipelineState::Listing;
            let Some(page) = pages.next().await else {
                debug!("Listing exhausted");
                break;
            };
            let page = page?;
            let index = page.index;
            self.stats.record_page(page.len());

            let mut keys = page.keys;
            if !self.completed.is_empty() {
                let before = keys.len();
                keys.retain(|k| !self.completed.contains(k));
                self.stats.record_skipped(before - keys.len());
            }
            if let Some(max) = limit {
                keys.truncate(max - admitted);
            }
            admitted += keys.len();

            if keys.is_empty() {
                debug!(page = index, "Nothing to do for page");
                continue;
            }

            self.state = PipelineState::Dispatching;
            let batch = pool.dispatch(keys, &self.cancel).await;

            self.state = PipelineState::Draining;
            let result = pool.drain(batch).await;

            self.state = PipelineState::Recording;
            for record in &result.records {
                self.sink.record(record).await?;
                self.stats.record_outcome(record);
            }

            if !result.undispatched.is_empty() {
                warn!(
                    page = index,
                    count = result.undispatched.len(),
                    "Keys left unprocessed after interrupt"
                );
            }

            debug!(
                page = index,
                recorded = result.records.len(),
                total = self.sink.recorded(),
                "Page complete"
            );
        }

        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("completed", &self.completed.len())
            .finish()
    }
}

/// Open the reconciliation log and run a migration.
///
/// With `config.resume`, keys the existing log already marks as done are
/// skipped.
pub async fn migrate(
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    cancel: CancellationFlag,
) -> Result<StatsSnapshot> {
    migrate_with_stats(config, store, cancel, Arc::new(MigrationStats::new())).await
}

/// [`migrate`] with caller-owned statistics, for live progress reporting.
pub async fn migrate_with_stats(
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    cancel: CancellationFlag,
    stats: Arc<MigrationStats>,
) -> Result<StatsSnapshot> {
    config.validate().map_err(BmError::Config)?;

    let format = config.mode.record_format();
    let completed = if config.resume {
        let keys = completed_keys(&config.recon_path, format)?;
        info!(keys = keys.len(), path = %config.recon_path.display(), "Resuming");
        keys
    } else {
        HashSet::new()
    };
    let recorder = Arc::new(ReconciliationRecorder::open(&config.recon_path, format).await?);

    Orchestrator::new(config, store, recorder)
        .with_cancellation(cancel)
        .with_completed_keys(completed)
        .with_stats(stats)
        .run()
        .await
}
