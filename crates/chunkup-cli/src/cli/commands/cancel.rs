//! `chunkup cancel <session_id>` – discard a stored session.

use anyhow::{bail, Result};
use chunkup_core::session::{SessionPersistence, SqliteSessionDb};

pub async fn run_cancel(db: &SqliteSessionDb, session_id: &str) -> Result<()> {
    if db.get(session_id).await?.is_none() {
        bail!("upload session {} not found", session_id);
    }
    db.delete(session_id).await?;
    println!("Cancelled {session_id}");
    Ok(())
}
