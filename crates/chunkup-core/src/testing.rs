//! Scripted in-process transport and session backend for scheduler and
//! uploader tests.

use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::control::UploadControl;
use crate::retry::TransferError;
use crate::session::{MemorySessionDb, SessionPersistence, UploadSession};
use crate::transport::{ChunkTransport, ChunkUpload, FinalizeRequest, FinalizeResponse};

#[derive(Default)]
struct Script {
    /// Remaining scripted failures per chunk index.
    fail_times: HashMap<usize, usize>,
    fail_always: HashSet<usize>,
    /// Stop the run (pause or cancel) when this chunk is first requested.
    stop_on: Option<(usize, UploadControl, bool)>,
    finalize_failures: usize,

    calls: Vec<usize>,
    received: BTreeMap<usize, Vec<u8>>,
    in_flight: usize,
    max_in_flight: usize,
    finalize_calls: Vec<FinalizeRequest>,
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    delay: Duration,
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Chunk `index` fails with HTTP 503 the next `times` attempts.
    pub fn fail_chunk(&self, index: usize, times: usize) {
        self.script().fail_times.insert(index, times);
    }

    pub fn fail_chunk_always(&self, index: usize) {
        self.script().fail_always.insert(index);
    }

    pub fn heal(&self) {
        let mut s = self.script();
        s.fail_always.clear();
        s.fail_times.clear();
    }

    pub fn pause_on(&self, index: usize, control: UploadControl) {
        self.script().stop_on = Some((index, control, false));
    }

    pub fn cancel_on(&self, index: usize, control: UploadControl) {
        self.script().stop_on = Some((index, control, true));
    }

    pub fn fail_finalize(&self, times: usize) {
        self.script().finalize_failures = times;
    }

    /// Chunk indices in the order they were requested, retries included.
    pub fn calls(&self) -> Vec<usize> {
        self.script().calls.clone()
    }

    pub fn received(&self) -> BTreeMap<usize, Vec<u8>> {
        self.script().received.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.script().in_flight
    }

    pub fn max_in_flight(&self) -> usize {
        self.script().max_in_flight
    }

    pub fn finalize_calls(&self) -> Vec<FinalizeRequest> {
        self.script().finalize_calls.clone()
    }
}

struct InFlight<'a>(&'a ScriptedTransport);

impl<'a> InFlight<'a> {
    fn enter(t: &'a ScriptedTransport) -> Self {
        let mut s = t.script();
        s.in_flight += 1;
        s.max_in_flight = s.max_in_flight.max(s.in_flight);
        drop(s);
        InFlight(t)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.script().in_flight -= 1;
    }
}

impl ChunkTransport for ScriptedTransport {
    async fn upload_chunk(
        &self,
        chunk: ChunkUpload,
        abort: CancellationToken,
    ) -> Result<(), TransferError> {
        let _guard = InFlight::enter(self);
        {
            let mut s = self.script();
            s.calls.push(chunk.chunk_index);
            let stop = match &s.stop_on {
                Some((index, control, cancel)) if *index == chunk.chunk_index => {
                    Some((control.clone(), *cancel))
                }
                _ => None,
            };
            if let Some((control, cancel)) = stop {
                s.stop_on = None;
                if cancel {
                    control.cancel();
                } else {
                    control.pause();
                }
            }
        }

        tokio::select! {
            _ = abort.cancelled() => return Err(TransferError::Aborted),
            _ = tokio::time::sleep(self.delay) => {}
        }

        let mut s = self.script();
        if s.fail_always.contains(&chunk.chunk_index) {
            return Err(TransferError::Http(500));
        }
        if let Some(left) = s.fail_times.get_mut(&chunk.chunk_index) {
            if *left > 0 {
                *left -= 1;
                return Err(TransferError::Http(503));
            }
        }
        assert_eq!(chunk.data.len() as u64, chunk.chunk_size);
        s.received.insert(chunk.chunk_index, chunk.data);
        Ok(())
    }

    async fn finalize(&self, request: &FinalizeRequest) -> Result<FinalizeResponse, TransferError> {
        let mut s = self.script();
        s.finalize_calls.push(request.clone());
        if s.finalize_failures > 0 {
            s.finalize_failures -= 1;
            return Err(TransferError::Http(502));
        }
        Ok(FinalizeResponse {
            url: format!("https://files.example/{}/{}", request.session_id, request.file_name),
        })
    }
}

/// Memory backend whose chosen writes fail, counting every `set` from 1.
#[derive(Default)]
pub(crate) struct FailingSessionDb {
    inner: MemorySessionDb,
    sets: AtomicUsize,
    fail_sets: Mutex<HashSet<usize>>,
}

impl FailingSessionDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `nth` call to `set` (1-based) fails without writing.
    pub fn fail_set(&self, nth: usize) {
        self.fail_sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(nth);
    }
}

impl SessionPersistence for FailingSessionDb {
    async fn get(&self, session_id: &str) -> Result<Option<UploadSession>> {
        self.inner.get(session_id).await
    }

    async fn set(&self, session: &UploadSession) -> Result<()> {
        let nth = self.sets.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = self
            .fail_sets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&nth);
        if fail {
            bail!("disk full (write {})", nth);
        }
        self.inner.set(session).await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.inner.delete(session_id).await
    }

    async fn list(&self) -> Result<Vec<UploadSession>> {
        self.inner.list().await
    }
}
