//! SQLite-backed session persistence (sqlx).
//!
//! One row per session. The full record lives in `record_json`; the other
//! columns mirror fields that are handy for inspection from the sqlite shell.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

use super::persist::SessionPersistence;
use super::types::UploadSession;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite session database.
///
/// The default database lives under the XDG state directory:
/// `~/.local/state/chunkup/sessions.db`.
#[derive(Clone)]
pub struct SqliteSessionDb {
    pool: Pool<Sqlite>,
}

impl SqliteSessionDb {
    /// Open (or create) the default session database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("chunkup")?;
        let state_dir = xdg_dirs.get_state_home().join("chunkup");
        Self::open_at(state_dir.join("sessions.db")).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await
            .with_context(|| format!("open session db {}", path.display()))?;
        let db = SqliteSessionDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                last_activity INTEGER NOT NULL,
                record_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the pool so the file can be reopened by another handle.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_record(json: &str) -> Result<UploadSession> {
    serde_json::from_str(json).context("decode session record")
}

impl SessionPersistence for SqliteSessionDb {
    async fn get(&self, session_id: &str) -> Result<Option<UploadSession>> {
        let row = sqlx::query(
            r#"
            SELECT record_json
            FROM sessions
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row.get("record_json");
        decode_record(&json).map(Some)
    }

    async fn set(&self, session: &UploadSession) -> Result<()> {
        let json = serde_json::to_string(session)?;
        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id, file_name, file_size, created_at, last_activity, record_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(session_id) DO UPDATE SET
                file_name = excluded.file_name,
                file_size = excluded.file_size,
                last_activity = excluded.last_activity,
                record_json = excluded.record_json
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.file_name)
        .bind(session.file_size as i64)
        .bind(session.created_at)
        .bind(session.last_activity)
        .bind(json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All sessions, newest first.
    async fn list(&self) -> Result<Vec<UploadSession>> {
        let rows = sqlx::query(
            r#"
            SELECT record_json
            FROM sessions
            ORDER BY created_at DESC, session_id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let json: String = row.get("record_json");
            out.push(decode_record(&json)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<SqliteSessionDb> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = SqliteSessionDb { pool };
    db.migrate().await?;
    Ok(db)
}
