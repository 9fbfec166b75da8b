//! Chunk planning.
//!
//! Splits a file into fixed-size chunks and, when chunk validation is on,
//! digests each chunk. Planning is deterministic: re-planning the same file
//! with the same chunk size reproduces the exact list a stored session
//! refers to by index.

mod range;

use std::io;

use crate::hasher::SharedHasher;
use crate::source::UploadFile;

pub use range::{chunk_count, chunk_len, plan_chunks, Chunk};

pub struct ChunkPlanner {
    hasher: SharedHasher,
    chunk_size: u64,
    validate: bool,
}

impl ChunkPlanner {
    pub fn new(hasher: SharedHasher, chunk_size: u64, validate: bool) -> Self {
        Self {
            hasher,
            chunk_size,
            validate,
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Plan `file`, reading each chunk once to digest it if validation is enabled.
    pub async fn plan(&self, file: &UploadFile) -> io::Result<Vec<Chunk>> {
        let mut chunks = plan_chunks(file.size(), self.chunk_size);
        if self.validate {
            for chunk in &mut chunks {
                let data = file.read_range(chunk.start, chunk.end).await?;
                chunk.hash = Some(self.hasher.hash_bytes(&data));
            }
        }
        tracing::debug!(
            file = file.name(),
            size = file.size(),
            chunk_size = self.chunk_size,
            chunks = chunks.len(),
            hashed = self.validate,
            "planned chunks"
        );
        Ok(chunks)
    }
}

/// Per-chunk digests in index order, or `None` if any chunk was not hashed.
pub fn chunk_hashes(chunks: &[Chunk]) -> Option<Vec<String>> {
    chunks.iter().map(|c| c.hash.clone()).collect()
}
