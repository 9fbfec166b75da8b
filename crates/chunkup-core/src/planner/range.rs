//! Chunk type and fixed-size range planning.

/// A single chunk: byte range [start, end) (half-open) of the source file.
///
/// Persisted state only ever refers to chunks by `index`; the bytes and the
/// struct itself are never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
    /// Content digest when chunk validation is enabled.
    pub hash: Option<String>,
}

impl Chunk {
    /// Length of this chunk in bytes.
    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Number of chunks for a file: `ceil(file_size / chunk_size)`.
pub fn chunk_count(file_size: u64, chunk_size: u64) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    file_size.div_ceil(chunk_size) as usize
}

/// Length of chunk `index`; the last chunk may be shorter, out-of-range indices are 0.
pub fn chunk_len(file_size: u64, chunk_size: u64, index: usize) -> u64 {
    let start = (index as u64).saturating_mul(chunk_size);
    if start >= file_size {
        return 0;
    }
    chunk_size.min(file_size - start)
}

/// Builds the chunk plan: boundaries `[i*chunk_size, min((i+1)*chunk_size, size))`.
///
/// Returns an empty vec if `file_size` is 0 or `chunk_size` is 0.
pub fn plan_chunks(file_size: u64, chunk_size: u64) -> Vec<Chunk> {
    let count = chunk_count(file_size, chunk_size);
    let mut out = Vec::with_capacity(count);
    for index in 0..count {
        let start = index as u64 * chunk_size;
        let end = (start + chunk_size).min(file_size);
        out.push(Chunk {
            index,
            start,
            end,
            hash: None,
        });
    }
    out
}
