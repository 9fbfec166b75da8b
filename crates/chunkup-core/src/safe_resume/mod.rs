//! Safe resume: prove a file still matches a stored session before any chunk
//! is sent.
//!
//! Checks run cheapest first: declared size, then the fingerprint (recomputed
//! with the session's chunk size), then, if the session recorded per-chunk
//! digests, every re-planned chunk. Any mismatch is fatal; a different file is
//! never resumed under an existing session id.

mod validate;

pub use validate::{validate_chunk_hashes, validate_fingerprint, validate_for_resume, validate_size};
