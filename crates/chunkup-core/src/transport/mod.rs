//! The two remote contracts the engine consumes: chunk upload and finalize.
//!
//! `ChunkTransport` is the seam between the scheduler and the network. The
//! bundled implementation is `HttpTransport` (libcurl); tests plug in scripted
//! in-process transports.

mod http;

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::retry::TransferError;

pub use http::HttpTransport;

/// One chunk submission. The endpoint must treat a repeated
/// `(session_id, chunk_index)` as a no-op success.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub session_id: String,
    pub chunk_index: usize,
    pub chunk_size: u64,
    pub hash: Option<String>,
    pub data: Vec<u8>,
}

/// Body of the finalize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub session_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub total_chunks: usize,
}

/// Reference to the assembled artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub url: String,
}

pub trait ChunkTransport: Send + Sync + 'static {
    /// Send one chunk. Must return promptly with `TransferError::Aborted` once
    /// `abort` is cancelled, and bound each attempt in time.
    fn upload_chunk(
        &self,
        chunk: ChunkUpload,
        abort: CancellationToken,
    ) -> impl Future<Output = Result<(), TransferError>> + Send;

    /// Ask the server to assemble every confirmed chunk.
    fn finalize(
        &self,
        request: &FinalizeRequest,
    ) -> impl Future<Output = Result<FinalizeResponse, TransferError>> + Send;
}
