//! `chunkup cleanup` – sweep sessions idle past the retention window.

use anyhow::Result;
use chunkup_core::session::{SessionStore, SqliteSessionDb};

pub async fn run_cleanup(store: SessionStore<SqliteSessionDb>) -> Result<()> {
    let removed = store.cleanup_expired().await?;
    if removed.is_empty() {
        println!("No expired sessions.");
    } else {
        for id in &removed {
            println!("Removed {id}");
        }
    }
    Ok(())
}
