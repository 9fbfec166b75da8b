//! Session store: create/update/load/list/delete/cleanup over a persistence backend.

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::UploadError;

use super::persist::SessionPersistence;
use super::types::{unix_millis, UploadSession};

/// Default retention for idle sessions.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub struct SessionStore<P> {
    backend: P,
    retention: Duration,
    active: Arc<Mutex<HashSet<String>>>,
}

impl<P: SessionPersistence> SessionStore<P> {
    pub fn new(backend: P) -> Self {
        Self::with_retention(backend, DEFAULT_RETENTION)
    }

    pub fn with_retention(backend: P, retention: Duration) -> Self {
        Self {
            backend,
            retention,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Persist a brand-new session. Fails if the id is already taken.
    pub async fn create(&self, session: &UploadSession) -> Result<()> {
        if self.backend.get(&session.session_id).await?.is_some() {
            bail!("upload session {} already exists", session.session_id);
        }
        self.backend.set(session).await?;
        tracing::debug!(
            session_id = %session.session_id,
            file = %session.file_name,
            total_chunks = session.total_chunks,
            "created upload session"
        );
        Ok(())
    }

    /// Touch `last_activity` and persist the whole record.
    pub async fn update(&self, session: &mut UploadSession) -> Result<()> {
        session.touch();
        self.backend.set(session).await
    }

    /// Add a confirmed chunk and persist. Re-confirming an index is a no-op
    /// that does not hit the backend. Returns true if the set grew.
    ///
    /// If the backend write fails, `session` is restored to what it was, so
    /// the in-memory record never claims a chunk the store does not hold.
    pub async fn mark_chunk_uploaded(
        &self,
        session: &mut UploadSession,
        index: usize,
    ) -> Result<bool> {
        let last_activity = session.last_activity;
        if !session.record_uploaded(index) {
            return Ok(false);
        }
        if let Err(e) = self.update(session).await {
            session.uploaded_chunks.remove(&index);
            session.last_activity = last_activity;
            return Err(e);
        }
        Ok(true)
    }

    pub async fn load(&self, session_id: &str) -> Result<Option<UploadSession>> {
        self.backend.get(session_id).await
    }

    pub async fn list(&self) -> Result<Vec<UploadSession>> {
        self.backend.list().await
    }

    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.backend.delete(session_id).await?;
        tracing::debug!(session_id, "deleted upload session");
        Ok(())
    }

    /// Remove sessions idle for longer than the retention window.
    /// Sessions currently leased by a running upload are kept.
    /// Returns the removed ids.
    pub async fn cleanup_expired(&self) -> Result<Vec<String>> {
        self.cleanup_expired_at(unix_millis()).await
    }

    /// Like `cleanup_expired` with an explicit "now" in Unix milliseconds.
    pub async fn cleanup_expired_at(&self, now_ms: i64) -> Result<Vec<String>> {
        let cutoff = now_ms.saturating_sub(self.retention.as_millis() as i64);
        let mut removed = Vec::new();
        for session in self.backend.list().await? {
            if session.last_activity >= cutoff || self.is_leased(&session.session_id) {
                continue;
            }
            self.backend.delete(&session.session_id).await?;
            removed.push(session.session_id);
        }
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "removed expired upload sessions");
        }
        Ok(removed)
    }

    /// Claim exclusive use of `session_id` for one scheduler in this process.
    pub fn acquire(&self, session_id: &str) -> Result<SessionLease, UploadError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(session_id.to_string()) {
            return Err(UploadError::SessionBusy(session_id.to_string()));
        }
        Ok(SessionLease {
            active: Arc::clone(&self.active),
            session_id: session_id.to_string(),
        })
    }

    pub fn is_leased(&self, session_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(session_id)
    }
}

/// Releases the session claim when dropped.
#[derive(Debug)]
pub struct SessionLease {
    active: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}
