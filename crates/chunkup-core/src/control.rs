//! Pause/cancel control for a running upload.
//!
//! An `UploadControl` is handed to the uploader; any clone can stop the run.
//! Each in-flight transfer gets a child token, so stopping the run aborts
//! every transfer cooperatively. Pause keeps the session for a later resume;
//! cancel also discards it.

use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Pause,
    Cancel,
}

#[derive(Debug, Clone, Default)]
pub struct UploadControl {
    token: CancellationToken,
    reason: Arc<Mutex<Option<StopReason>>>,
}

impl UploadControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.stop(StopReason::Pause);
    }

    /// Cancel wins over an earlier pause.
    pub fn cancel(&self) {
        self.stop(StopReason::Cancel);
    }

    fn stop(&self, reason: StopReason) {
        {
            let mut current = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
            match (*current, reason) {
                (Some(StopReason::Cancel), _) => {}
                _ => *current = Some(reason),
            }
        }
        self.token.cancel();
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        *self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once pause or cancel is requested.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    /// Token for one transfer attempt; cancelled when the run is stopped.
    pub fn transfer_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
