//! `chunkup finalize <session_id>` – retry assembly without re-sending chunks.

use anyhow::Result;
use chunkup_core::config::ChunkupConfig;
use chunkup_core::session::{SessionStore, SqliteSessionDb};

use super::drive::build_uploader;

pub async fn run_finalize(
    store: SessionStore<SqliteSessionDb>,
    cfg: &ChunkupConfig,
    endpoint: &str,
    session_id: &str,
) -> Result<()> {
    let mut uploader = build_uploader(store, cfg, endpoint)?;
    let done = uploader.finalize(session_id).await?;
    println!("Uploaded {} -> {}", done.session_id, done.url);
    Ok(())
}
