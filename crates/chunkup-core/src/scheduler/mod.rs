//! Upload scheduler: bounded-concurrency chunk dispatch with per-chunk retry.
//!
//! The scheduler keeps at most `max_concurrent` transfers in flight and
//! refills a slot as soon as one finishes. A failed transfer is classified
//! and either parked in the backoff queue or, once its retries are spent,
//! moved to the failed queue while the other chunks carry on. Confirmed
//! chunks are recorded in the session and persisted one at a time.

mod queue;
mod run;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::session::UploadSession;

pub use queue::{ChunkQueue, FailedChunk, RetryState};
pub use run::{RunContext, RunReport};

/// Default interval between progress ticks while transfers are running.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

pub struct UploadScheduler<T> {
    transport: Arc<T>,
    policy: RetryPolicy,
    max_concurrent: usize,
    progress_interval: Duration,
    queue: ChunkQueue,
}

impl<T> UploadScheduler<T> {
    pub fn new(transport: Arc<T>, policy: RetryPolicy, max_concurrent: usize) -> Self {
        Self {
            transport,
            policy,
            max_concurrent: max_concurrent.max(1),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            queue: ChunkQueue::new(),
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Queue every chunk the session has not confirmed yet.
    pub fn schedule(&mut self, session: &UploadSession) {
        self.queue.load(session.remaining_chunks());
    }

    /// Re-drive the failed queue with fresh retry counters.
    /// Returns how many chunks were re-queued.
    pub fn retry_failed(&mut self) -> usize {
        let n = self.queue.requeue_failed();
        if n > 0 {
            tracing::info!(chunks = n, "re-queued failed chunks");
        }
        n
    }

    /// Drop every queued and failed chunk. Confirmed chunks in the session
    /// are not touched.
    pub fn cancel(&mut self) {
        self.queue.clear();
    }

    pub fn failed(&self) -> &BTreeMap<usize, FailedChunk> {
        self.queue.failed()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.queue.failed().keys().copied().collect()
    }

    pub fn has_failed(&self) -> bool {
        !self.queue.failed().is_empty()
    }
}
