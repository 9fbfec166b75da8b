//! Pending, backoff and failed queues for one scheduler.

use std::collections::{BTreeMap, VecDeque};
use tokio::time::Instant;

/// A chunk waiting out its backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub index: usize,
    /// Retries already spent (0 before the first retry).
    pub retries: u32,
    pub eligible_at: Instant,
}

/// A chunk that exhausted its retries or hit a non-retryable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChunk {
    pub retries: u32,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct ChunkQueue {
    pending: VecDeque<(usize, u32)>,
    retry_after: Vec<RetryState>,
    failed: BTreeMap<usize, FailedChunk>,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue fresh chunks, skipping any already queued or failed.
    pub fn load(&mut self, indices: impl IntoIterator<Item = usize>) {
        for index in indices {
            if self.contains(index) {
                continue;
            }
            self.pending.push_back((index, 0));
        }
    }

    fn contains(&self, index: usize) -> bool {
        self.failed.contains_key(&index)
            || self.pending.iter().any(|(i, _)| *i == index)
            || self.retry_after.iter().any(|r| r.index == index)
    }

    /// Next chunk to start: pending first, then the earliest retry that is due.
    pub fn next_ready(&mut self, now: Instant) -> Option<(usize, u32)> {
        if let Some(entry) = self.pending.pop_front() {
            return Some(entry);
        }
        let pos = self
            .retry_after
            .iter()
            .enumerate()
            .filter(|(_, r)| r.eligible_at <= now)
            .min_by_key(|(_, r)| r.eligible_at)
            .map(|(pos, _)| pos)?;
        let r = self.retry_after.remove(pos);
        Some((r.index, r.retries))
    }

    /// When the earliest backoff expires, if any chunk is waiting.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.retry_after.iter().map(|r| r.eligible_at).min()
    }

    pub fn push_retry(&mut self, index: usize, retries: u32, eligible_at: Instant) {
        self.retry_after.push(RetryState {
            index,
            retries,
            eligible_at,
        });
    }

    pub fn push_failed(&mut self, index: usize, failed: FailedChunk) {
        self.failed.insert(index, failed);
    }

    pub fn remove_failed(&mut self, index: usize) -> Option<FailedChunk> {
        self.failed.remove(&index)
    }

    /// Move every failed chunk back to pending with a fresh retry budget.
    /// Returns how many were moved.
    pub fn requeue_failed(&mut self) -> usize {
        let failed = std::mem::take(&mut self.failed);
        let n = failed.len();
        self.pending.extend(failed.into_keys().map(|index| (index, 0)));
        n
    }

    /// Nothing left to start now or later (the failed queue does not count).
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.retry_after.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn failed(&self) -> &BTreeMap<usize, FailedChunk> {
        &self.failed
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.retry_after.clear();
        self.failed.clear();
    }
}
