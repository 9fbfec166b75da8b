//! HTTP transport over libcurl.
//!
//! `POST {endpoint}/chunks` carries the raw chunk bytes with the session id,
//! index, size and optional digest in `X-*` headers. `POST {endpoint}/finalize`
//! carries a JSON `FinalizeRequest` and expects `{"url": ...}` back. Each call
//! runs on a blocking thread; the abort token is polled from curl's progress
//! callback.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::retry::TransferError;

use super::{ChunkTransport, ChunkUpload, FinalizeRequest, FinalizeResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct HttpTransport {
    chunks_url: Url,
    finalize_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    /// `endpoint` is the service base URL; `timeout` bounds each attempt.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(endpoint).with_context(|| format!("invalid endpoint URL {}", endpoint))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("endpoint must be http or https: {}", endpoint);
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            chunks_url: base.join("chunks")?,
            finalize_url: base.join("finalize")?,
            timeout,
        })
    }

    pub fn chunks_url(&self) -> &Url {
        &self.chunks_url
    }

    pub fn finalize_url(&self) -> &Url {
        &self.finalize_url
    }
}

/// Outcome of one blocking POST: status code and response body.
struct PostResponse {
    code: u32,
    body: Vec<u8>,
}

fn post_blocking(
    url: &str,
    headers: &[String],
    body: &[u8],
    timeout: Duration,
    abort: Option<&CancellationToken>,
) -> Result<PostResponse, TransferError> {
    let mut response = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(TransferError::Curl)?;
    easy.post(true).map_err(TransferError::Curl)?;
    easy.post_fields_copy(body).map_err(TransferError::Curl)?;
    easy.connect_timeout(CONNECT_TIMEOUT).map_err(TransferError::Curl)?;
    easy.timeout(timeout).map_err(TransferError::Curl)?;

    let mut list = curl::easy::List::new();
    for h in headers {
        list.append(h).map_err(TransferError::Curl)?;
    }
    // Suppress curl's default "Expect: 100-continue" on large bodies.
    list.append("Expect:").map_err(TransferError::Curl)?;
    easy.http_headers(list).map_err(TransferError::Curl)?;
    if abort.is_some() {
        easy.progress(true).map_err(TransferError::Curl)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                response.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(TransferError::Curl)?;
        if let Some(token) = abort {
            transfer
                .progress_function(|_, _, _, _| !token.is_cancelled())
                .map_err(TransferError::Curl)?;
        }
        if let Err(e) = transfer.perform() {
            if e.is_aborted_by_callback() {
                return Err(TransferError::Aborted);
            }
            return Err(TransferError::Curl(e));
        }
    }

    let code = easy.response_code().map_err(TransferError::Curl)?;
    Ok(PostResponse {
        code,
        body: response,
    })
}

fn join_error(e: tokio::task::JoinError) -> TransferError {
    TransferError::Protocol(format!("transfer task failed: {}", e))
}

impl ChunkTransport for HttpTransport {
    async fn upload_chunk(
        &self,
        chunk: ChunkUpload,
        abort: CancellationToken,
    ) -> Result<(), TransferError> {
        if abort.is_cancelled() {
            return Err(TransferError::Aborted);
        }
        let url = self.chunks_url.to_string();
        let timeout = self.timeout;
        let mut headers = vec![
            "Content-Type: application/octet-stream".to_string(),
            format!("X-Upload-Session: {}", chunk.session_id),
            format!("X-Chunk-Index: {}", chunk.chunk_index),
            format!("X-Chunk-Size: {}", chunk.chunk_size),
        ];
        if let Some(hash) = &chunk.hash {
            headers.push(format!("X-Chunk-Hash: {}", hash));
        }

        let resp = tokio::task::spawn_blocking(move || {
            post_blocking(&url, &headers, &chunk.data, timeout, Some(&abort))
        })
        .await
        .map_err(join_error)??;

        if !(200..300).contains(&resp.code) {
            return Err(TransferError::Http(resp.code));
        }
        Ok(())
    }

    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse, TransferError> {
        let url = self.finalize_url.to_string();
        let timeout = self.timeout;
        let body = serde_json::to_vec(request)
            .map_err(|e| TransferError::Protocol(format!("encode finalize request: {}", e)))?;
        let headers = vec![
            "Content-Type: application/json".to_string(),
            "Accept: application/json".to_string(),
        ];

        let resp = tokio::task::spawn_blocking(move || post_blocking(&url, &headers, &body, timeout, None))
            .await
            .map_err(join_error)??;

        if !(200..300).contains(&resp.code) {
            return Err(TransferError::Http(resp.code));
        }
        serde_json::from_slice(&resp.body)
            .map_err(|e| TransferError::Protocol(format!("finalize response: {}", e)))
    }
}
