//! Session-level upload state machine.

use std::fmt;

/// `Idle -> Planning -> Uploading <-> Paused -> Finalizing -> Completed`, with
/// `Failed` on unrecoverable errors and `Cancelled` on explicit cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Planning,
    Uploading,
    Paused,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl UploadState {
    /// Whether moving from `self` to `to` is a legal step.
    ///
    /// `Idle -> Uploading` is the resume entry point and `Idle -> Failed` a
    /// rejected resume; `Planning -> Finalizing` covers an empty file;
    /// `Failed -> Uploading` re-drives failed chunks; `Failed -> Finalizing`
    /// retries finalize only.
    /// Terminal and paused states may return to `Idle` for a new run.
    pub fn can_transition(self, to: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, to),
            (Idle, Planning)
                | (Idle, Uploading)
                | (Idle, Finalizing)
                | (Idle, Failed)
                | (Planning, Uploading)
                | (Planning, Failed)
                | (Planning, Finalizing)
                | (Uploading, Paused)
                | (Uploading, Finalizing)
                | (Uploading, Failed)
                | (Uploading, Cancelled)
                | (Paused, Uploading)
                | (Paused, Cancelled)
                | (Finalizing, Completed)
                | (Finalizing, Failed)
                | (Failed, Uploading)
                | (Failed, Finalizing)
                | (Paused, Idle)
                | (Completed, Idle)
                | (Failed, Idle)
                | (Cancelled, Idle)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadState::Completed | UploadState::Failed | UploadState::Cancelled
        )
    }

    /// True while a scheduler or finalize call owns the session.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            UploadState::Planning | UploadState::Uploading | UploadState::Finalizing
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Planning => "planning",
            UploadState::Uploading => "uploading",
            UploadState::Paused => "paused",
            UploadState::Finalizing => "finalizing",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
            UploadState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
