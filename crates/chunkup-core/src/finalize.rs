//! Finalization: ask the server to assemble a fully confirmed session.
//!
//! On success the session record is deleted. On failure it is kept untouched
//! so finalize can be retried without re-sending any chunk.

use crate::error::UploadError;
use crate::session::{SessionPersistence, SessionStore, UploadSession};
use crate::transport::{ChunkTransport, FinalizeRequest};

/// Reference to the assembled artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedUpload {
    pub session_id: String,
    pub url: String,
}

pub struct FinalizationCoordinator<'a, T, P> {
    transport: &'a T,
    store: &'a SessionStore<P>,
}

impl<'a, T: ChunkTransport, P: SessionPersistence> FinalizationCoordinator<'a, T, P> {
    pub fn new(transport: &'a T, store: &'a SessionStore<P>) -> Self {
        Self { transport, store }
    }

    pub async fn finalize(&self, session: &UploadSession) -> Result<FinalizedUpload, UploadError> {
        if !session.is_complete() {
            return Err(UploadError::NotReady {
                session_id: session.session_id.clone(),
                uploaded: session.uploaded_chunks.len(),
                total: session.total_chunks,
            });
        }

        let request = FinalizeRequest {
            session_id: session.session_id.clone(),
            file_name: session.file_name.clone(),
            file_size: session.file_size,
            file_type: session.file_type.clone(),
            total_chunks: session.total_chunks,
        };
        let response = match self.transport.finalize(&request).await {
            Ok(r) => r,
            Err(source) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    "finalize failed, session kept for retry: {}",
                    source
                );
                return Err(UploadError::Assembly {
                    session_id: session.session_id.clone(),
                    source,
                });
            }
        };

        if let Err(e) = self.store.delete(&session.session_id).await {
            tracing::warn!(
                session_id = %session.session_id,
                "upload finalized but session record not removed: {:#}",
                e
            );
        }
        tracing::info!(session_id = %session.session_id, url = %response.url, "upload finalized");
        Ok(FinalizedUpload {
            session_id: session.session_id.clone(),
            url: response.url,
        })
    }
}
