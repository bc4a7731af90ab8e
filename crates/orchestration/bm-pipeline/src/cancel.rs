//! Cooperative interruption shared between the signal handler and the pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set once when the run should stop admitting new keys.
///
/// Clones share the same flag. In-flight work is never interrupted by it.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
