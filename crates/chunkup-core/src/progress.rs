//! Progress reporting for uploads (bytes confirmed, throughput, ETA).
//!
//! Progress is derived, never persisted: uploaded bytes come from the
//! session's confirmed chunk set and speed from a short rolling window of
//! observations taken on every chunk confirmation and on a fixed interval.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::session::UploadSession;

/// Observations older than this are dropped (always keeping the last two).
pub const SPEED_WINDOW: Duration = Duration::from_secs(5);

/// Snapshot of upload progress for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadProgress {
    /// Bytes in confirmed chunks.
    pub uploaded_bytes: u64,
    /// File size in bytes.
    pub total_bytes: u64,
    /// Percentage complete in [0, 100].
    pub percentage: f64,
    pub chunks_uploaded: usize,
    pub total_chunks: usize,
    /// Bytes per second over the observation window.
    pub speed: f64,
    /// Estimated time remaining; `None` when speed is zero (unknown, not zero).
    pub eta: Option<Duration>,
}

impl UploadProgress {
    pub fn is_complete(&self) -> bool {
        self.chunks_uploaded == self.total_chunks
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    window: Duration,
    samples: VecDeque<(Instant, u64)>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::with_window(SPEED_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Record the session's current state at `now` and return a snapshot.
    pub fn observe(&mut self, session: &UploadSession, now: Instant) -> UploadProgress {
        let uploaded_bytes = session.uploaded_bytes();
        self.samples.push_back((now, uploaded_bytes));
        while self.samples.len() > 2 {
            match self.samples.front() {
                Some((t, _)) if now.saturating_duration_since(*t) > self.window => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }

        let total_bytes = session.file_size;
        let speed = self.speed();
        let remaining = total_bytes.saturating_sub(uploaded_bytes);
        let eta = if remaining == 0 {
            Some(Duration::ZERO)
        } else if speed > 0.0 {
            Some(Duration::from_secs_f64(remaining as f64 / speed))
        } else {
            None
        };
        let percentage = if total_bytes == 0 {
            100.0
        } else {
            (uploaded_bytes as f64 / total_bytes as f64 * 100.0).min(100.0)
        };

        UploadProgress {
            uploaded_bytes,
            total_bytes,
            percentage,
            chunks_uploaded: session.uploaded_chunks.len(),
            total_chunks: session.total_chunks,
            speed,
            eta,
        }
    }

    /// Bytes per second between the oldest and newest retained observation.
    fn speed(&self) -> f64 {
        let (Some((t0, b0)), Some((t1, b1))) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        let dt = t1.saturating_duration_since(*t0).as_secs_f64();
        if dt <= 0.0 {
            return 0.0;
        }
        b1.saturating_sub(*b0) as f64 / dt
    }
}
