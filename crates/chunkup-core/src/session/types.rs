//! The durable upload session record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::planner::{chunk_count, chunk_len};

/// Progress record for one upload, persisted as JSON with camelCase keys and
/// `uploadedChunks` as an explicit array.
///
/// `chunk_size` and `file_fingerprint` never change after creation; a resume
/// must reproduce both exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub session_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub chunk_size: u64,
    pub total_chunks: usize,
    pub uploaded_chunks: BTreeSet<usize>,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds; drives retention cleanup.
    pub last_activity: i64,
    pub file_fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_hashes: Option<Vec<String>>,
}

impl UploadSession {
    pub fn new(
        session_id: String,
        file_name: String,
        file_size: u64,
        file_type: String,
        chunk_size: u64,
        file_fingerprint: String,
        chunk_hashes: Option<Vec<String>>,
    ) -> Self {
        let now = unix_millis();
        Self {
            session_id,
            file_name,
            file_size,
            file_type,
            chunk_size,
            total_chunks: chunk_count(file_size, chunk_size),
            uploaded_chunks: BTreeSet::new(),
            created_at: now,
            last_activity: now,
            file_fingerprint,
            chunk_hashes,
        }
    }

    /// Add a confirmed chunk. Idempotent; indices outside `[0, total_chunks)`
    /// are refused. Returns true if the set grew.
    pub fn record_uploaded(&mut self, index: usize) -> bool {
        if index >= self.total_chunks {
            return false;
        }
        self.uploaded_chunks.insert(index)
    }

    pub fn is_uploaded(&self, index: usize) -> bool {
        self.uploaded_chunks.contains(&index)
    }

    pub fn is_complete(&self) -> bool {
        self.uploaded_chunks.len() == self.total_chunks
    }

    /// Indices not yet confirmed, ascending.
    pub fn remaining_chunks(&self) -> Vec<usize> {
        (0..self.total_chunks)
            .filter(|i| !self.uploaded_chunks.contains(i))
            .collect()
    }

    /// Sum of the sizes of confirmed chunks.
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_chunks
            .iter()
            .map(|&i| chunk_len(self.file_size, self.chunk_size, i))
            .sum()
    }

    pub fn touch(&mut self) {
        self.last_activity = unix_millis().max(self.last_activity);
    }
}

/// Current time as Unix milliseconds (for session timestamps).
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
