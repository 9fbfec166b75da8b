//! Pluggable key-value persistence for session records.

use anyhow::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use super::types::UploadSession;

/// Durable store of session records keyed by `session_id`.
///
/// Any store that can get/set/delete/list whole records can back a
/// [`SessionStore`](super::SessionStore): SQLite, a directory of JSON files,
/// a remote KV service.
pub trait SessionPersistence: Send + Sync + 'static {
    fn get(&self, session_id: &str)
        -> impl Future<Output = Result<Option<UploadSession>>> + Send;

    /// Insert or replace the record for `session.session_id`.
    fn set(&self, session: &UploadSession) -> impl Future<Output = Result<()>> + Send;

    /// Remove a record; removing an unknown id is not an error.
    fn delete(&self, session_id: &str) -> impl Future<Output = Result<()>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<UploadSession>>> + Send;
}

/// In-process store; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemorySessionDb {
    sessions: Mutex<HashMap<String, UploadSession>>,
}

impl MemorySessionDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionPersistence for MemorySessionDb {
    async fn get(&self, session_id: &str) -> Result<Option<UploadSession>> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(session_id).cloned())
    }

    async fn set(&self, session: &UploadSession) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UploadSession>> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<UploadSession> = sessions.values().cloned().collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.session_id.cmp(&a.session_id))
        });
        Ok(out)
    }
}
