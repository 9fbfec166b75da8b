//! Scheduler event loop: refill, wait for a completion, a due retry, a
//! progress tick or a stop request, repeat.

use std::collections::HashMap;
use std::future::pending;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use crate::control::{StopReason, UploadControl};
use crate::event::{EventSink, UploadEvent};
use crate::planner::Chunk;
use crate::progress::{ProgressTracker, UploadProgress};
use crate::retry::{classify, RetryDecision, TransferError};
use crate::session::{SessionPersistence, SessionStore, UploadSession};
use crate::source::UploadFile;
use crate::transport::{ChunkTransport, ChunkUpload};

use super::{FailedChunk, UploadScheduler};

/// Everything a run borrows from its caller.
pub struct RunContext<'a, P> {
    pub file: &'a UploadFile,
    /// The session's plan, indexed by chunk index.
    pub chunks: &'a [Chunk],
    pub store: &'a SessionStore<P>,
    pub control: &'a UploadControl,
    pub events: &'a EventSink,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    /// Set when the run ended because of pause or cancel.
    pub stopped: Option<StopReason>,
    pub progress: UploadProgress,
}

type TaskOutput = (usize, Result<(), TransferError>);

impl<T: ChunkTransport> UploadScheduler<T> {
    /// Drive queued chunks until none are pending or backing off, or until
    /// `control` is stopped. After a stop, every in-flight transfer is aborted
    /// and awaited before returning, the session is left exactly as last
    /// persisted and all queues are cleared.
    pub async fn run<P: SessionPersistence>(
        &mut self,
        ctx: RunContext<'_, P>,
        session: &mut UploadSession,
        tracker: &mut ProgressTracker,
    ) -> RunReport {
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut in_flight: HashMap<usize, u32> = HashMap::new();
        let mut ticker = tokio::time::interval(
            self.progress_interval
                .max(std::time::Duration::from_millis(10)),
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stopped = None;

        loop {
            if ctx.control.is_stopped() {
                stopped = ctx.control.stop_reason();
                break;
            }

            self.refill(&ctx, session, &mut tasks, &mut in_flight);

            if tasks.is_empty() && self.queue.is_drained() {
                break;
            }

            let retry_at = self.queue.next_retry_at();
            let has_capacity = tasks.len() < self.max_concurrent;
            let retry_due = async {
                match retry_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => pending().await,
                }
            };

            tokio::select! {
                _ = ctx.control.stopped() => {}
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok((index, outcome)) => {
                        let retries = in_flight.remove(&index).unwrap_or(0);
                        self.on_result(&ctx, session, tracker, index, retries, outcome).await;
                    }
                    Err(e) if e.is_panic() => {
                        tracing::error!(session_id = %session.session_id, "chunk transfer task panicked: {}", e);
                    }
                    Err(_) => {}
                },
                _ = retry_due, if has_capacity && retry_at.is_some() => {}
                _ = ticker.tick() => {
                    ctx.events.progress(tracker.observe(session, Instant::now()));
                }
            }
        }

        if stopped.is_some() {
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            in_flight.clear();
            self.queue.clear();
            tracing::info!(
                session_id = %session.session_id,
                reason = ?stopped,
                confirmed = session.uploaded_chunks.len(),
                "upload run stopped"
            );
        } else {
            // A task that panicked never reported back; its chunk is failed.
            for (index, retries) in in_flight.drain() {
                self.queue.push_failed(
                    index,
                    FailedChunk {
                        retries,
                        error: "transfer task panicked".to_string(),
                    },
                );
            }
        }

        let progress = tracker.observe(session, Instant::now());
        ctx.events.progress(progress.clone());
        RunReport { stopped, progress }
    }

    /// Start transfers until the concurrency limit is reached or nothing is ready.
    fn refill<P>(
        &mut self,
        ctx: &RunContext<'_, P>,
        session: &UploadSession,
        tasks: &mut JoinSet<TaskOutput>,
        in_flight: &mut HashMap<usize, u32>,
    ) {
        let now = Instant::now();
        while tasks.len() < self.max_concurrent {
            let Some((index, retries)) = self.queue.next_ready(now) else {
                break;
            };
            if session.is_uploaded(index) || in_flight.contains_key(&index) {
                continue;
            }
            let Some(chunk) = ctx.chunks.get(index).cloned() else {
                self.queue.push_failed(
                    index,
                    FailedChunk {
                        retries,
                        error: format!("chunk {} is not in the plan", index),
                    },
                );
                continue;
            };

            let transport = self.transport.clone();
            let file = ctx.file.clone();
            let session_id = session.session_id.clone();
            let abort = ctx.control.transfer_token();
            tracing::trace!(session_id = %session_id, chunk = index, retries, "starting chunk transfer");
            tasks.spawn(async move {
                let data = match file.read_range(chunk.start, chunk.end).await {
                    Ok(data) => data,
                    Err(e) => return (index, Err(TransferError::Source(e))),
                };
                let upload = ChunkUpload {
                    session_id,
                    chunk_index: index,
                    chunk_size: chunk.size(),
                    hash: chunk.hash,
                    data,
                };
                (index, transport.upload_chunk(upload, abort).await)
            });
            in_flight.insert(index, retries);
        }
    }

    async fn on_result<P: SessionPersistence>(
        &mut self,
        ctx: &RunContext<'_, P>,
        session: &mut UploadSession,
        tracker: &mut ProgressTracker,
        index: usize,
        retries: u32,
        outcome: Result<(), TransferError>,
    ) {
        let err = match outcome {
            Ok(()) => {
                if let Err(e) = ctx.store.mark_chunk_uploaded(session, index).await {
                    // Unconfirmed until stored; `retry_failed` sends it again.
                    tracing::warn!(
                        session_id = %session.session_id,
                        chunk = index,
                        "persist confirmed chunk failed: {:#}",
                        e
                    );
                    let error = format!("persist confirmed chunk: {:#}", e);
                    self.queue.push_failed(
                        index,
                        FailedChunk {
                            retries,
                            error: error.clone(),
                        },
                    );
                    ctx.events
                        .send(UploadEvent::ChunkFailed { index, error }, ctx.control)
                        .await;
                    return;
                }
                self.queue.remove_failed(index);
                tracing::debug!(session_id = %session.session_id, chunk = index, "chunk confirmed");
                ctx.events
                    .send(UploadEvent::ChunkCompleted { index }, ctx.control)
                    .await;
                ctx.events.progress(tracker.observe(session, Instant::now()));
                return;
            }
            // The loop exits on its next pass.
            Err(TransferError::Aborted) if ctx.control.is_stopped() => return,
            Err(e) => e,
        };

        match self.policy.decide(retries, classify(&err)) {
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    chunk = index,
                    attempt = retries + 1,
                    ?delay,
                    "chunk transfer failed, retrying: {}",
                    err
                );
                self.queue.push_retry(index, retries + 1, Instant::now() + delay);
                ctx.events
                    .send(
                        UploadEvent::ChunkRetrying {
                            index,
                            attempt: retries + 1,
                            delay,
                        },
                        ctx.control,
                    )
                    .await;
            }
            RetryDecision::NoRetry => {
                tracing::warn!(
                    session_id = %session.session_id,
                    chunk = index,
                    retries,
                    "chunk failed permanently: {}",
                    err
                );
                let error = err.to_string();
                self.queue.push_failed(
                    index,
                    FailedChunk {
                        retries,
                        error: error.clone(),
                    },
                );
                ctx.events
                    .send(UploadEvent::ChunkFailed { index, error }, ctx.control)
                    .await;
            }
        }
    }
}
