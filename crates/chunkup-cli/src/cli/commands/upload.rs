//! `chunkup upload <path>` – upload a file as a new session.

use anyhow::Result;
use chunkup_core::config::ChunkupConfig;
use chunkup_core::session::{SessionStore, SqliteSessionDb};
use chunkup_core::source::UploadFile;
use std::path::Path;

use super::drive::{build_uploader, Console};

/// Per-invocation settings that override config.toml.
#[derive(Debug, Default, Clone)]
pub struct UploadOverrides {
    pub file_type: Option<String>,
    pub chunk_size: Option<u64>,
    pub concurrency: Option<usize>,
    pub no_validate: bool,
}

impl UploadOverrides {
    pub fn apply(&self, cfg: &ChunkupConfig) -> Result<ChunkupConfig> {
        let mut cfg = cfg.clone();
        if let Some(size) = self.chunk_size {
            cfg.chunk_size = size;
        }
        if let Some(n) = self.concurrency {
            cfg.max_concurrent_uploads = n;
        }
        if self.no_validate {
            cfg.validate_chunks = false;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

pub async fn run_upload(
    store: SessionStore<SqliteSessionDb>,
    cfg: &ChunkupConfig,
    endpoint: &str,
    path: &Path,
    overrides: UploadOverrides,
) -> Result<()> {
    let cfg = overrides.apply(cfg)?;
    let mut file = UploadFile::open(path).await?;
    if let Some(t) = overrides.file_type {
        file = file.with_type(t);
    }
    let mut uploader = build_uploader(store, &cfg, endpoint)?;

    println!(
        "Uploading {} ({} bytes, {}) to {}",
        file.name(),
        file.size(),
        file.file_type(),
        endpoint
    );
    let console = Console::start();
    let result = uploader.start(&file, &console.control, &console.events).await;
    console.finish(result).await
}
