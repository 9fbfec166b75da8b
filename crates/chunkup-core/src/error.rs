//! Errors surfaced to callers of the upload engine.
//!
//! Per-chunk network failures never appear here directly: they are retried by
//! the scheduler and only reach the caller as `Incomplete` once a chunk has
//! exhausted its retries.

use crate::progress::UploadProgress;
use crate::retry::TransferError;
use crate::state::UploadState;

/// File identity or content no longer matches what a session recorded.
/// Always fatal; never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("file fingerprint mismatch: session has {expected}, file has {actual}")]
    FingerprintMismatch { expected: String, actual: String },
    #[error("chunk count mismatch: session has {expected} chunks, file plans to {actual}")]
    ChunkCountMismatch { expected: usize, actual: usize },
    #[error("chunk {index} content changed since the session was created")]
    ChunkHashMismatch { index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("file size mismatch: session expects {expected} bytes, file has {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("upload session {0} not found")]
    SessionNotFound(String),

    #[error("upload session {0} is already being uploaded")]
    SessionBusy(String),

    #[error("finalize failed for session {session_id}: {source}")]
    Assembly {
        session_id: String,
        #[source]
        source: TransferError,
    },

    #[error("upload incomplete: {} chunks failed", failed.len())]
    Incomplete {
        session_id: String,
        /// Chunk indices in the failed queue.
        failed: Vec<usize>,
        /// Progress at the moment the run gave up.
        progress: UploadProgress,
    },

    #[error("session {session_id} is not ready to finalize: {uploaded} of {total} chunks confirmed")]
    NotReady {
        session_id: String,
        uploaded: usize,
        total: usize,
    },

    #[error("invalid upload state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: UploadState, to: UploadState },

    #[error("nothing to retry: no failed chunks from a previous run")]
    NothingToRetry,

    #[error("read source file: {0}")]
    Source(#[from] std::io::Error),

    #[error("session store: {0:#}")]
    Store(#[source] anyhow::Error),

    #[error("invalid configuration: {0:#}")]
    Config(#[source] anyhow::Error),
}

impl UploadError {
    /// True for errors that mean the file does not belong to the session.
    pub fn is_identity_error(&self) -> bool {
        matches!(
            self,
            UploadError::Integrity(_) | UploadError::SizeMismatch { .. }
        )
    }
}
