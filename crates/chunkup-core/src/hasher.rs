//! Pluggable content hashing for fingerprints and chunk digests.
//!
//! The fingerprint generator and chunk planner never name a digest algorithm
//! directly; they receive a [`SharedHasher`]. SHA-256 is the default provider.

use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Computes a content digest rendered as a string.
pub trait ContentHasher: Send + Sync {
    /// Digest `data` and return it as lowercase hex.
    fn hash_bytes(&self, data: &[u8]) -> String;
}

/// Hasher handle shared by the fingerprint generator, planner and resume validation.
pub type SharedHasher = Arc<dyn ContentHasher>;

/// SHA-256 provider (sha2 + hex).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn hash_bytes(&self, data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }
}

/// The default hasher used when the caller does not inject one.
pub fn default_hasher() -> SharedHasher {
    Arc::new(Sha256Hasher)
}
