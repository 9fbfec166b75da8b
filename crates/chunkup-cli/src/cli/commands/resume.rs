//! `chunkup resume <session_id> <path>` – continue a stored session.

use anyhow::Result;
use chunkup_core::config::ChunkupConfig;
use chunkup_core::session::{SessionStore, SqliteSessionDb};
use chunkup_core::source::UploadFile;
use std::path::Path;

use super::drive::{build_uploader, Console};

pub async fn run_resume(
    store: SessionStore<SqliteSessionDb>,
    cfg: &ChunkupConfig,
    endpoint: &str,
    session_id: &str,
    path: &Path,
    file_type: Option<String>,
) -> Result<()> {
    let mut file = UploadFile::open(path).await?;
    // The fingerprint covers the declared type, so reuse the stored one.
    let stored = store.load(session_id).await?;
    match (file_type, stored) {
        (Some(t), _) => file = file.with_type(t),
        (None, Some(s)) => file = file.with_type(s.file_type),
        (None, None) => {}
    }
    let mut uploader = build_uploader(store, cfg, endpoint)?;

    let console = Console::start();
    let result = uploader
        .resume(session_id, &file, &console.control, &console.events)
        .await;
    console.finish(result).await
}
