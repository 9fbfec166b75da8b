//! Per-chunk transfer error type for retry classification.

use std::fmt;

/// Error returned by a single chunk transfer attempt (or a finalize call).
/// Kept separate from `UploadError` so the scheduler can classify and decide
/// retries before anything reaches the caller.
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// The attempt exceeded its time bound.
    Timeout,
    /// Network-level failure reported by a non-curl transport.
    Connection(String),
    /// The endpoint answered but the response could not be understood.
    Protocol(String),
    /// Stopped by pause/cancel.
    Aborted,
    /// Reading the chunk from the local file failed. Not retried.
    Source(std::io::Error),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::Timeout => write!(f, "transfer timed out"),
            TransferError::Connection(msg) => write!(f, "connection: {}", msg),
            TransferError::Protocol(msg) => write!(f, "unexpected response: {}", msg),
            TransferError::Aborted => write!(f, "transfer aborted"),
            TransferError::Source(e) => write!(f, "read chunk: {}", e),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Source(e) => Some(e),
            TransferError::Http(_)
            | TransferError::Timeout
            | TransferError::Connection(_)
            | TransferError::Protocol(_)
            | TransferError::Aborted => None,
        }
    }
}
