//! Compares a stored session with the file offered for resume.

use crate::error::{IntegrityError, UploadError};
use crate::fingerprint::FingerprintGenerator;
use crate::hasher::SharedHasher;
use crate::planner::{Chunk, ChunkPlanner};
use crate::session::UploadSession;
use crate::source::UploadFile;

pub fn validate_size(session: &UploadSession, file: &UploadFile) -> Result<(), UploadError> {
    if file.size() != session.file_size {
        return Err(UploadError::SizeMismatch {
            expected: session.file_size,
            actual: file.size(),
        });
    }
    Ok(())
}

pub fn validate_fingerprint(session: &UploadSession, actual: &str) -> Result<(), IntegrityError> {
    if actual != session.file_fingerprint {
        return Err(IntegrityError::FingerprintMismatch {
            expected: session.file_fingerprint.clone(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Compare re-planned chunks with the session's recorded digests. A session
/// without digests accepts any plan of the right length.
pub fn validate_chunk_hashes(session: &UploadSession, chunks: &[Chunk]) -> Result<(), IntegrityError> {
    if chunks.len() != session.total_chunks {
        return Err(IntegrityError::ChunkCountMismatch {
            expected: session.total_chunks,
            actual: chunks.len(),
        });
    }
    let Some(expected) = &session.chunk_hashes else {
        return Ok(());
    };
    if expected.len() != chunks.len() {
        return Err(IntegrityError::ChunkCountMismatch {
            expected: expected.len(),
            actual: chunks.len(),
        });
    }
    for (chunk, want) in chunks.iter().zip(expected) {
        if chunk.hash.as_deref() != Some(want.as_str()) {
            return Err(IntegrityError::ChunkHashMismatch { index: chunk.index });
        }
    }
    Ok(())
}

/// Returns the re-planned chunk list if `file` may resume `session`.
///
/// The plan uses the session's chunk size and hashes chunks only when the
/// session recorded digests, so the indices line up with `uploaded_chunks`.
pub async fn validate_for_resume(
    session: &UploadSession,
    file: &UploadFile,
    hasher: &SharedHasher,
) -> Result<Vec<Chunk>, UploadError> {
    validate_size(session, file)?;

    let fingerprint = FingerprintGenerator::new(hasher.clone(), session.chunk_size)
        .fingerprint(file)
        .await?;
    validate_fingerprint(session, &fingerprint)?;

    let planner = ChunkPlanner::new(
        hasher.clone(),
        session.chunk_size,
        session.chunk_hashes.is_some(),
    );
    let chunks = planner.plan(file).await?;
    validate_chunk_hashes(session, &chunks)?;

    tracing::debug!(
        session_id = %session.session_id,
        chunks = chunks.len(),
        already_uploaded = session.uploaded_chunks.len(),
        "resume validated"
    );
    Ok(chunks)
}
