//! Statistics for migration runs.

use bm_types::ReconciliationRecord;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live counters shared by the orchestrator and the worker pool.
///
/// Counters are updated from many workers at once, so everything is atomic
/// except the timestamps.
#[derive(Debug, Default)]
pub struct MigrationStats {
    started_at: Mutex<Option<DateTime<Utc>>>,
    completed_at: Mutex<Option<DateTime<Utc>>>,

    pages_listed: AtomicU64,
    keys_listed: AtomicU64,
    keys_skipped: AtomicU64,
    keys_succeeded: AtomicU64,
    keys_failed: AtomicU64,
    retries: AtomicU64,
    manifest_lines: AtomicU64,
    downloads_succeeded: AtomicU64,

    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MigrationStats {
    /// Create a new stats tracker with the current time as start time.
    pub fn new() -> Self {
        Self {
            started_at: Mutex::new(Some(Utc::now())),
            ..Default::default()
        }
    }

    /// Mark the run as complete with the current time.
    pub fn complete(&self) {
        *self.completed_at.lock() = Some(Utc::now());
    }

    /// Record a listed page and the number of keys it held.
    pub fn record_page(&self, keys: usize) {
        self.pages_listed.fetch_add(1, Ordering::Relaxed);
        self.keys_listed.fetch_add(keys as u64, Ordering::Relaxed);
    }

    /// Record keys skipped because they were already recorded.
    pub fn record_skipped(&self, keys: usize) {
        self.keys_skipped.fetch_add(keys as u64, Ordering::Relaxed);
    }

    /// Record a durably written outcome.
    pub fn record_outcome(&self, record: &ReconciliationRecord) {
        if record.is_success() {
            self.keys_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.keys_failed.fetch_add(1, Ordering::Relaxed);
        }

        let retries = match record {
            ReconciliationRecord::Copy(o) => u64::from(o.attempts.saturating_sub(1)),
            ReconciliationRecord::Manifest(o) => {
                self.manifest_lines
                    .fetch_add(o.total_lines, Ordering::Relaxed);
                self.downloads_succeeded
                    .fetch_add(o.successful_downloads, Ordering::Relaxed);
                o.retries
            }
        };
        self.retries.fetch_add(retries, Ordering::Relaxed);
    }

    /// A worker picked up a key.
    pub fn begin_key(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
    }

    /// A worker finished a key.
    pub fn end_key(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Keys currently being processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of keys processed at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Keys listed so far.
    pub fn keys_listed(&self) -> u64 {
        self.keys_listed.load(Ordering::Relaxed)
    }

    /// Keys with a recorded outcome so far.
    pub fn keys_recorded(&self) -> u64 {
        self.keys_succeeded.load(Ordering::Relaxed) + self.keys_failed.load(Ordering::Relaxed)
    }

    /// Keys recorded as failed so far.
    pub fn keys_failed(&self) -> u64 {
        self.keys_failed.load(Ordering::Relaxed)
    }

    /// Take a point-in-time snapshot of the statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: *self.started_at.lock(),
            completed_at: *self.completed_at.lock(),
            pages_listed: self.pages_listed.load(Ordering::Relaxed),
            keys_listed: self.keys_listed.load(Ordering::Relaxed),
            keys_skipped: self.keys_skipped.load(Ordering::Relaxed),
            keys_succeeded: self.keys_succeeded.load(Ordering::Relaxed),
            keys_failed: self.keys_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            manifest_lines: self.manifest_lines.load(Ordering::Relaxed),
            downloads_succeeded: self.downloads_succeeded.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight(),
            interrupted: false,
        }
    }
}

/// Serializable snapshot of run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed
    pub completed_at: Option<DateTime<Utc>>,

    /// Listing pages fetched
    pub pages_listed: u64,

    /// Keys returned by listing
    pub keys_listed: u64,

    /// Keys skipped because the log already had them
    pub keys_skipped: u64,

    /// Keys recorded as successful
    pub keys_succeeded: u64,

    /// Keys recorded as failed
    pub keys_failed: u64,

    /// Attempts beyond the first, summed over all keys
    pub retries: u64,

    /// Manifest lines seen (manifest mode)
    pub manifest_lines: u64,

    /// Referenced objects fetched (manifest mode)
    pub downloads_succeeded: u64,

    /// Highest concurrent key count observed
    pub peak_in_flight: usize,

    /// Whether the run stopped on an interrupt
    pub interrupted: bool,
}

impl StatsSnapshot {
    /// Keys with a recorded outcome.
    pub fn keys_recorded(&self) -> u64 {
        self.keys_succeeded + self.keys_failed
    }

    /// Get the duration of the run.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Calculate the throughput in recorded keys per second.
    pub fn keys_per_second(&self) -> Option<f64> {
        self.duration().map(|d| {
            let secs = d.num_milliseconds() as f64 / 1000.0;
            if secs > 0.0 {
                self.keys_recorded() as f64 / secs
            } else {
                0.0
            }
        })
    }
}
