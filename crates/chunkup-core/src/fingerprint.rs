//! Content identity for a file, used only to gate resume.
//!
//! Small files (at most two chunks) are hashed whole. Larger files hash the
//! first and last chunk independently and then hash both digests together
//! with the declared size, type and name, so the cost stays bounded no matter
//! how large the file is.

use std::io;

use crate::hasher::SharedHasher;
use crate::source::UploadFile;

pub struct FingerprintGenerator {
    hasher: SharedHasher,
    chunk_size: u64,
}

impl FingerprintGenerator {
    /// `chunk_size` must be the session's chunk size; a different value yields
    /// a different fingerprint for large files.
    pub fn new(hasher: SharedHasher, chunk_size: u64) -> Self {
        Self { hasher, chunk_size }
    }

    pub async fn fingerprint(&self, file: &UploadFile) -> io::Result<String> {
        let size = file.size();
        if size <= self.chunk_size.saturating_mul(2) {
            let data = file.read_range(0, size).await?;
            return Ok(self.hasher.hash_bytes(&data));
        }

        let head = file.read_range(0, self.chunk_size).await?;
        let tail = file.read_range(size - self.chunk_size, size).await?;
        let head_hash = self.hasher.hash_bytes(&head);
        let tail_hash = self.hasher.hash_bytes(&tail);
        let combined = format!(
            "{}{}{}_{}_{}",
            head_hash,
            tail_hash,
            size,
            file.file_type(),
            file.name()
        );
        Ok(self.hasher.hash_bytes(combined.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::default_hasher;

    fn generator(chunk_size: u64) -> FingerprintGenerator {
        FingerprintGenerator::new(default_hasher(), chunk_size)
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn identical_bytes_and_metadata_are_deterministic() {
        let a = UploadFile::from_bytes("rec.webm", "video/webm", patterned(1000));
        let b = UploadFile::from_bytes("rec.webm", "video/webm", patterned(1000));
        let g = generator(64);
        assert_eq!(g.fingerprint(&a).await.unwrap(), g.fingerprint(&b).await.unwrap());
    }

    #[tokio::test]
    async fn small_file_hashes_whole_content() {
        let data = patterned(100);
        let file = UploadFile::from_bytes("x.bin", "application/octet-stream", data.clone());
        let fp = generator(64).fingerprint(&file).await.unwrap();
        assert_eq!(fp, default_hasher().hash_bytes(&data));

        let mut changed = data;
        changed[50] ^= 0xFF;
        let other = UploadFile::from_bytes("x.bin", "application/octet-stream", changed);
        assert_ne!(fp, generator(64).fingerprint(&other).await.unwrap());
    }

    #[tokio::test]
    async fn large_file_detects_head_and_tail_changes() {
        let g = generator(64);
        let data = patterned(1000);
        let base = g
            .fingerprint(&UploadFile::from_bytes("a.wav", "audio/wav", data.clone()))
            .await
            .unwrap();

        let mut head = data.clone();
        head[0] ^= 1;
        let head_fp = g
            .fingerprint(&UploadFile::from_bytes("a.wav", "audio/wav", head))
            .await
            .unwrap();
        assert_ne!(base, head_fp);

        let mut tail = data.clone();
        tail[999] ^= 1;
        let tail_fp = g
            .fingerprint(&UploadFile::from_bytes("a.wav", "audio/wav", tail))
            .await
            .unwrap();
        assert_ne!(base, tail_fp);
    }

    #[tokio::test]
    async fn large_file_includes_metadata() {
        let g = generator(64);
        let data = patterned(1000);
        let a = g
            .fingerprint(&UploadFile::from_bytes("a.wav", "audio/wav", data.clone()))
            .await
            .unwrap();
        let renamed = g
            .fingerprint(&UploadFile::from_bytes("b.wav", "audio/wav", data.clone()))
            .await
            .unwrap();
        let retyped = g
            .fingerprint(&UploadFile::from_bytes("a.wav", "audio/x-wav", data))
            .await
            .unwrap();
        assert_ne!(a, renamed);
        assert_ne!(a, retyped);
    }

    #[tokio::test]
    async fn chunk_size_changes_large_fingerprint() {
        let file = UploadFile::from_bytes("a.bin", "application/octet-stream", patterned(1000));
        let a = generator(64).fingerprint(&file).await.unwrap();
        let b = generator(128).fingerprint(&file).await.unwrap();
        assert_ne!(a, b);
    }
}
