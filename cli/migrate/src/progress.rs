//! Periodic progress reporting for bucket-migrate.

use bm_cli_common::format_number;
use bm_pipeline::MigrationStats;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Prints a progress line to stderr every `interval` while a run is active.
pub struct ProgressReporter {
    enabled: bool,
    interval: Duration,
    stats: Arc<MigrationStats>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Create a reporter over live run statistics.
    pub fn new(enabled: bool, interval_secs: u64, stats: Arc<MigrationStats>) -> Self {
        Self {
            enabled,
            interval: Duration::from_secs(interval_secs.max(1)),
            stats,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start the background reporter.
    pub fn start(&mut self) {
        if !self.enabled {
            return;
        }

        let stats = Arc::clone(&self.stats);
        let stop = Arc::clone(&self.stop);
        let interval = self.interval;
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick is immediate

            loop {
                ticker.tick().await;
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let _ = writeln!(
                    io::stderr(),
                    "[Progress] {} ({:.1}s elapsed)",
                    progress_line(&stats),
                    started.elapsed().as_secs_f64()
                );
            }
        });

        self.handle = Some(handle);
    }

    /// Stop the reporter.
    pub async fn stop(mut self) {
        if !self.enabled {
            return;
        }

        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

fn progress_line(stats: &MigrationStats) -> String {
    format!(
        "{} listed, {} recorded, {} failed, {} in flight",
        format_number(stats.keys_listed()),
        format_number(stats.keys_recorded()),
        format_number(stats.keys_failed()),
        stats.in_flight()
    )
}
