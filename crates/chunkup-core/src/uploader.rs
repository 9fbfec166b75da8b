//! The session-level upload driver.
//!
//! `ChunkedUploader` owns the transport, the session store and the hasher and
//! walks one session at a time through the upload state machine: plan (or
//! validate a stored session), upload, then finalize. Pause and cancel come in
//! through an [`UploadControl`]; progress and chunk events go out through an
//! [`EventSink`].

use std::sync::Arc;
use std::time::Duration;

use crate::config::ChunkupConfig;
use crate::control::{StopReason, UploadControl};
use crate::error::UploadError;
use crate::event::{EventSink, UploadEvent};
use crate::finalize::{FinalizationCoordinator, FinalizedUpload};
use crate::fingerprint::FingerprintGenerator;
use crate::hasher::{default_hasher, SharedHasher};
use crate::planner::{chunk_hashes, Chunk, ChunkPlanner};
use crate::progress::{ProgressTracker, UploadProgress};
use crate::retry::RetryPolicy;
use crate::safe_resume::validate_for_resume;
use crate::scheduler::{RunContext, UploadScheduler};
use crate::session::{unix_millis, SessionLease, SessionPersistence, SessionStore, UploadSession};
use crate::source::UploadFile;
use crate::state::UploadState;
use crate::transport::ChunkTransport;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Completed(FinalizedUpload),
    /// Stopped by pause; the session is kept for `resume`.
    Paused {
        session_id: String,
        progress: UploadProgress,
    },
    /// Stopped by cancel; the session record has been removed.
    Cancelled { session_id: String },
}

/// State kept after a run that ended with failed chunks, so they can be
/// re-driven without re-planning.
struct LastRun<T> {
    file: UploadFile,
    session: UploadSession,
    chunks: Vec<Chunk>,
    scheduler: UploadScheduler<T>,
}

pub struct ChunkedUploader<T, P> {
    transport: Arc<T>,
    store: Arc<SessionStore<P>>,
    hasher: SharedHasher,
    chunk_size: u64,
    validate_chunks: bool,
    max_concurrent: usize,
    policy: RetryPolicy,
    progress_interval: Duration,
    state: UploadState,
    last_run: Option<LastRun<T>>,
}

/// Session ids look like `upload_<unix ms>_<first 12 hex of the fingerprint>`.
fn new_session_id(fingerprint: &str) -> String {
    let short: String = fingerprint.chars().take(12).collect();
    format!("upload_{}_{}", unix_millis(), short)
}

impl<T: ChunkTransport, P: SessionPersistence> ChunkedUploader<T, P> {
    /// Fails with [`UploadError::Config`] if `config` does not pass
    /// [`ChunkupConfig::validate`].
    pub fn new(
        config: &ChunkupConfig,
        transport: Arc<T>,
        store: Arc<SessionStore<P>>,
    ) -> Result<Self, UploadError> {
        config.validate().map_err(UploadError::Config)?;
        Ok(Self {
            transport,
            store,
            hasher: default_hasher(),
            chunk_size: config.chunk_size,
            validate_chunks: config.validate_chunks,
            max_concurrent: config.max_concurrent_uploads,
            policy: config.retry_policy(),
            progress_interval: config.progress_interval(),
            state: UploadState::Idle,
            last_run: None,
        })
    }

    pub fn with_hasher(mut self, hasher: SharedHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn store(&self) -> &SessionStore<P> {
        &self.store
    }

    /// Failed chunk indices from the last run, if it ended incomplete.
    pub fn failed_chunks(&self) -> Vec<usize> {
        self.last_run
            .as_ref()
            .map(|r| r.scheduler.failed_indices())
            .unwrap_or_default()
    }

    async fn transition(
        &mut self,
        to: UploadState,
        control: &UploadControl,
        events: &EventSink,
    ) -> Result<(), UploadError> {
        if !self.state.can_transition(to) {
            return Err(UploadError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(from = %self.state, to = %to, "upload state");
        self.state = to;
        events.send(UploadEvent::StateChanged(to), control).await;
        Ok(())
    }

    /// Return to `Idle` before a new run. `&mut self` means no run is in
    /// flight; a run whose future was dropped leaves a stale state behind.
    fn reset(&mut self) {
        self.state = UploadState::Idle;
    }

    fn new_scheduler(&self) -> UploadScheduler<T> {
        UploadScheduler::new(self.transport.clone(), self.policy, self.max_concurrent)
            .with_progress_interval(self.progress_interval)
    }

    /// Start a new session for `file` and upload it.
    pub async fn start(
        &mut self,
        file: &UploadFile,
        control: &UploadControl,
        events: &EventSink,
    ) -> Result<UploadOutcome, UploadError> {
        self.reset();
        self.last_run = None;
        self.transition(UploadState::Planning, control, events).await?;

        let (session, chunks, lease) = match self.plan_session(file).await {
            Ok(planned) => planned,
            Err(e) => {
                self.transition(UploadState::Failed, control, events).await?;
                return Err(e);
            }
        };
        tracing::info!(
            session_id = %session.session_id,
            file = %session.file_name,
            size = session.file_size,
            chunks = session.total_chunks,
            "upload started"
        );

        let mut scheduler = self.new_scheduler();
        scheduler.schedule(&session);
        self.drive(file.clone(), session, chunks, scheduler, lease, control, events)
            .await
    }

    async fn plan_session(
        &self,
        file: &UploadFile,
    ) -> Result<(UploadSession, Vec<Chunk>, SessionLease), UploadError> {
        let fingerprint = FingerprintGenerator::new(self.hasher.clone(), self.chunk_size)
            .fingerprint(file)
            .await?;
        let chunks = ChunkPlanner::new(self.hasher.clone(), self.chunk_size, self.validate_chunks)
            .plan(file)
            .await?;

        let session = UploadSession::new(
            new_session_id(&fingerprint),
            file.name().to_string(),
            file.size(),
            file.file_type().to_string(),
            self.chunk_size,
            fingerprint,
            if self.validate_chunks {
                chunk_hashes(&chunks)
            } else {
                None
            },
        );
        let lease = self.store.acquire(&session.session_id)?;
        self.store.create(&session).await.map_err(UploadError::Store)?;
        Ok((session, chunks, lease))
    }

    /// Continue a stored session. The file must match the session's size,
    /// fingerprint and (if recorded) chunk digests; only unconfirmed chunks
    /// are sent.
    pub async fn resume(
        &mut self,
        session_id: &str,
        file: &UploadFile,
        control: &UploadControl,
        events: &EventSink,
    ) -> Result<UploadOutcome, UploadError> {
        self.reset();
        self.last_run = None;

        let session = self
            .store
            .load(session_id)
            .await
            .map_err(UploadError::Store)?
            .ok_or_else(|| UploadError::SessionNotFound(session_id.to_string()))?;
        let lease = self.store.acquire(session_id)?;
        let chunks = match validate_for_resume(&session, file, &self.hasher).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(session_id, "resume rejected: {}", e);
                self.transition(UploadState::Failed, control, events).await?;
                return Err(e);
            }
        };
        tracing::info!(
            session_id,
            confirmed = session.uploaded_chunks.len(),
            total = session.total_chunks,
            "resuming upload"
        );

        let mut scheduler = self.new_scheduler();
        scheduler.schedule(&session);
        self.drive(file.clone(), session, chunks, scheduler, lease, control, events)
            .await
    }

    /// Re-attempt every chunk left in the failed queue by the last run, with
    /// fresh retry counters.
    pub async fn retry_failed(
        &mut self,
        control: &UploadControl,
        events: &EventSink,
    ) -> Result<UploadOutcome, UploadError> {
        let Some(mut last) = self.last_run.take() else {
            return Err(UploadError::NothingToRetry);
        };
        if last.scheduler.retry_failed() == 0 {
            return Err(UploadError::NothingToRetry);
        }
        let lease = self.store.acquire(&last.session.session_id)?;
        self.drive(
            last.file,
            last.session,
            last.chunks,
            last.scheduler,
            lease,
            control,
            events,
        )
        .await
    }

    /// Finalize a stored, fully confirmed session. Used to retry after an
    /// `Assembly` error; no chunk is re-sent.
    pub async fn finalize(&mut self, session_id: &str) -> Result<FinalizedUpload, UploadError> {
        self.reset();
        let control = UploadControl::new();
        let events = EventSink::none();
        let session = self
            .store
            .load(session_id)
            .await
            .map_err(UploadError::Store)?
            .ok_or_else(|| UploadError::SessionNotFound(session_id.to_string()))?;
        let _lease = self.store.acquire(session_id)?;
        self.transition(UploadState::Finalizing, &control, &events).await?;
        self.finish(&session, &control, &events).await
    }

    async fn finish(
        &mut self,
        session: &UploadSession,
        control: &UploadControl,
        events: &EventSink,
    ) -> Result<FinalizedUpload, UploadError> {
        let result = FinalizationCoordinator::new(self.transport.as_ref(), self.store.as_ref())
            .finalize(session)
            .await;
        let next = if result.is_ok() {
            UploadState::Completed
        } else {
            UploadState::Failed
        };
        self.transition(next, control, events).await?;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &mut self,
        file: UploadFile,
        mut session: UploadSession,
        chunks: Vec<Chunk>,
        mut scheduler: UploadScheduler<T>,
        _lease: SessionLease,
        control: &UploadControl,
        events: &EventSink,
    ) -> Result<UploadOutcome, UploadError> {
        let mut tracker = ProgressTracker::new();
        if !session.is_complete() {
            self.transition(UploadState::Uploading, control, events).await?;
            let report = scheduler
                .run(
                    RunContext {
                        file: &file,
                        chunks: &chunks,
                        store: self.store.as_ref(),
                        control,
                        events,
                    },
                    &mut session,
                    &mut tracker,
                )
                .await;

            match report.stopped {
                Some(StopReason::Pause) => {
                    self.transition(UploadState::Paused, control, events).await?;
                    tracing::info!(session_id = %session.session_id, "upload paused");
                    return Ok(UploadOutcome::Paused {
                        session_id: session.session_id,
                        progress: report.progress,
                    });
                }
                Some(StopReason::Cancel) => {
                    scheduler.cancel();
                    self.transition(UploadState::Cancelled, control, events).await?;
                    self.store
                        .delete(&session.session_id)
                        .await
                        .map_err(UploadError::Store)?;
                    tracing::info!(session_id = %session.session_id, "upload cancelled");
                    return Ok(UploadOutcome::Cancelled {
                        session_id: session.session_id,
                    });
                }
                None => {}
            }

            if scheduler.has_failed() || !session.is_complete() {
                let failed = if scheduler.has_failed() {
                    scheduler.failed_indices()
                } else {
                    session.remaining_chunks()
                };
                self.transition(UploadState::Failed, control, events).await?;
                tracing::warn!(
                    session_id = %session.session_id,
                    failed = ?failed,
                    "upload incomplete"
                );
                let err = UploadError::Incomplete {
                    session_id: session.session_id.clone(),
                    failed,
                    progress: report.progress,
                };
                self.last_run = Some(LastRun {
                    file,
                    session,
                    chunks,
                    scheduler,
                });
                return Err(err);
            }
        }

        self.transition(UploadState::Finalizing, control, events).await?;
        let done = self.finish(&session, control, events).await?;
        Ok(UploadOutcome::Completed(done))
    }
}
