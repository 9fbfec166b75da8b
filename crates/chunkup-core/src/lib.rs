pub mod config;
pub mod logging;

pub mod control;
pub mod error;
pub mod event;
pub mod finalize;
pub mod fingerprint;
pub mod hasher;
pub mod planner;
pub mod progress;
pub mod retry;
pub mod safe_resume;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod state;
pub mod transport;
pub mod uploader;

pub use error::{IntegrityError, UploadError};
pub use finalize::FinalizedUpload;
pub use uploader::{ChunkedUploader, UploadOutcome};

#[cfg(test)]
mod testing;
