//! Events emitted while an upload runs.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::control::UploadControl;
use crate::progress::UploadProgress;
use crate::state::UploadState;

#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    StateChanged(UploadState),
    ChunkCompleted { index: usize },
    ChunkRetrying { index: usize, attempt: u32, delay: Duration },
    /// Retries exhausted or error not retryable; the chunk is in the failed queue.
    ChunkFailed { index: usize, error: String },
    Progress(UploadProgress),
}

/// Optional event channel. Chunk and state events wait for channel capacity
/// until the run is paused or cancelled; progress ticks are dropped when the
/// receiver lags.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<UploadEvent>>,
}

impl EventSink {
    /// Sink that discards every event.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(tx: mpsc::Sender<UploadEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Create a sink and the receiver that observes it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<UploadEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Deliver `event`, waiting while the channel is full. Once `control` is
    /// stopped a full channel drops the event instead, so a receiver that
    /// never drains cannot hold up pause or cancel.
    pub async fn send(&self, event: UploadEvent, control: &UploadControl) {
        let Some(tx) = &self.tx else {
            return;
        };
        tokio::select! {
            biased;
            _ = tx.send(event) => {}
            _ = control.stopped() => {
                tracing::debug!("event channel full after stop; event dropped");
            }
        }
    }

    pub fn progress(&self, progress: UploadProgress) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(UploadEvent::Progress(progress));
        }
    }
}
