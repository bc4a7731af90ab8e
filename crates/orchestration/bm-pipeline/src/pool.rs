//! Bounded worker pool with a per-page drain barrier.
//!
//! The pool lives for the whole run. `capacity` workers share one bounded job
//! queue, so at most `capacity` keys are ever being processed at once. Each
//! page gets its own reply channel; draining it is the barrier between pages.

use crate::cancel::CancellationFlag;
use crate::processor::KeyProcessor;
use crate::stats::MigrationStats;
use bm_types::{ObjectKey, ReconciliationRecord};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Reason recorded for a key whose work never produced an outcome.
pub const WORKER_LOST_REASON: &str = "worker lost";

/// Reason recorded for a key whose processing panicked.
pub const WORKER_PANICKED_REASON: &str = "worker panicked";

/// One key handed to a worker.
struct CopyJob {
    position: usize,
    key: ObjectKey,
    reply: mpsc::UnboundedSender<(usize, ReconciliationRecord)>,
}

/// Keys of one page that were handed to the pool.
pub struct PageBatch {
    dispatched: Vec<ObjectKey>,
    undispatched: Vec<ObjectKey>,
    replies: mpsc::UnboundedReceiver<(usize, ReconciliationRecord)>,
}

impl PageBatch {
    /// Keys that reached a worker queue.
    pub fn dispatched(&self) -> usize {
        self.dispatched.len()
    }
}

/// Outcome of draining one page.
#[derive(Debug, Default)]
pub struct PageResult {
    /// One record per dispatched key, in listing order
    pub records: Vec<ReconciliationRecord>,

    /// Keys never dispatched because the run was interrupted
    pub undispatched: Vec<ObjectKey>,
}

/// Fixed-size set of workers processing keys concurrently.
pub struct CopyWorkerPool {
    capacity: usize,
    sender: Option<mpsc::Sender<CopyJob>>,
    handles: Vec<JoinHandle<()>>,
    processor: Arc<dyn KeyProcessor>,
}

impl CopyWorkerPool {
    /// Spawn `capacity` workers running `processor`.
    pub fn new(
        capacity: usize,
        processor: Arc<dyn KeyProcessor>,
        stats: Arc<MigrationStats>,
    ) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel::<CopyJob>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..capacity)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let processor = processor.clone();
                let stats = stats.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, receiver, processor, stats).await;
                })
            })
            .collect();

        debug!(capacity, "Started worker pool");

        Self {
            capacity,
            sender: Some(sender),
            handles,
            processor,
        }
    }

    /// Number of workers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hand every key of a page to the workers.
    ///
    /// Blocks while the queue is full. Once `cancel` is set the remaining keys
    /// are held back and returned undispatched from [`CopyWorkerPool::drain`].
    pub async fn dispatch(&self, keys: Vec<ObjectKey>, cancel: &CancellationFlag) -> PageBatch {
        let (reply, replies) = mpsc::unbounded_channel();
        let mut dispatched = Vec::with_capacity(keys.len());
        let mut undispatched = Vec::new();

        let mut keys = keys.into_iter();
        for key in keys.by_ref() {
            if cancel.is_cancelled() {
                undispatched.push(key);
                break;
            }

            let Some(sender) = &self.sender else {
                undispatched.push(key);
                break;
            };

            let job = CopyJob {
                position: dispatched.len(),
                key: key.clone(),
                reply: reply.clone(),
            };
            if let Err(e) = sender.send(job).await {
                error!("Worker queue closed");
                undispatched.push(e.0.key);
                break;
            }
            dispatched.push(key);
        }
        undispatched.extend(keys);

        PageBatch {
            dispatched,
            undispatched,
            replies,
        }
    }

    /// Wait until every dispatched key of the page has an outcome.
    pub async fn drain(&self, batch: PageBatch) -> PageResult {
        let PageBatch {
            dispatched,
            undispatched,
            mut replies,
        } = batch;

        let mut slots: Vec<Option<ReconciliationRecord>> = vec![None; dispatched.len()];
        // Closes once every job holding a sender has replied or been dropped.
        while let Some((position, record)) = replies.recv().await {
            if let Some(slot) = slots.get_mut(position) {
                *slot = Some(record);
            }
        }

        let records = slots
            .into_iter()
            .zip(dispatched)
            .map(|(slot, key)| {
                slot.unwrap_or_else(|| {
                    warn!(key = %key, "No outcome for dispatched key");
                    self.processor.lost(key, WORKER_LOST_REASON)
                })
            })
            .collect();

        PageResult {
            records,
            undispatched,
        }
    }

    /// Close the queue and wait for the workers to exit.
    pub async fn shutdown(mut self, timeout: Duration) {
        self.sender.take();
        let handles = std::mem::take(&mut self.handles);

        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                for (i, result) in results.into_iter().enumerate() {
                    if let Err(e) = result {
                        error!(worker = i, error = %e, "Worker task failed");
                    }
                }
                debug!("Worker pool stopped");
            }
            Err(_) => {
                warn!("Shutdown timeout exceeded, some workers may not have completed");
            }
        }
    }
}

impl std::fmt::Debug for CopyWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyWorkerPool")
            .field("capacity", &self.capacity)
            .field("open", &self.sender.is_some())
            .finish()
    }
}

/// Pull jobs until the queue closes.
async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<CopyJob>>>,
    processor: Arc<dyn KeyProcessor>,
    stats: Arc<MigrationStats>,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            break;
        };

        stats.begin_key();
        let key = job.key.clone();
        let record = match AssertUnwindSafe(processor.process(job.key))
            .catch_unwind()
            .await
        {
            Ok(record) => record,
            Err(_) => {
                error!(worker = worker_id, key = %key, "Key processing panicked");
                processor.lost(key, WORKER_PANICKED_REASON)
            }
        };
        stats.end_key();

        // The page may already have been abandoned; nothing to deliver to then.
        let _ = job.reply.send((job.position, record));
    }

    info!(worker = worker_id, "Worker stopped");
}
