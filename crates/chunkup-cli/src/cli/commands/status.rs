//! `chunkup status` – list stored sessions.

use anyhow::Result;
use chunkup_core::session::{SessionPersistence, SqliteSessionDb};

pub async fn run_status(db: &SqliteSessionDb) -> Result<()> {
    let sessions = db.list().await?;
    if sessions.is_empty() {
        println!("No upload sessions.");
        return Ok(());
    }
    println!("{:<36} {:<9} {:<12} {}", "SESSION", "CHUNKS", "SIZE", "FILE");
    for s in sessions {
        println!(
            "{:<36} {:<9} {:<12} {}",
            s.session_id,
            format!("{}/{}", s.uploaded_chunks.len(), s.total_chunks),
            s.file_size,
            s.file_name
        );
    }
    Ok(())
}
