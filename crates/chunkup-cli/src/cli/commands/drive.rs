//! Shared plumbing for commands that run an upload: progress printing,
//! Ctrl-C to pause, and reporting how the run ended.

use anyhow::Result;
use chunkup_core::config::ChunkupConfig;
use chunkup_core::control::UploadControl;
use chunkup_core::event::{EventSink, UploadEvent};
use chunkup_core::session::{SessionStore, SqliteSessionDb};
use chunkup_core::transport::HttpTransport;
use chunkup_core::{ChunkedUploader, UploadError, UploadOutcome};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub(super) type CliUploader = ChunkedUploader<HttpTransport, SqliteSessionDb>;

pub(super) fn build_uploader(
    store: SessionStore<SqliteSessionDb>,
    cfg: &ChunkupConfig,
    endpoint: &str,
) -> Result<CliUploader> {
    let transport = HttpTransport::new(endpoint, cfg.chunk_timeout())?;
    Ok(ChunkedUploader::new(cfg, Arc::new(transport), Arc::new(store))?)
}

/// Everything a running upload needs from the terminal.
pub(super) struct Console {
    pub control: UploadControl,
    pub events: EventSink,
    printer: JoinHandle<()>,
}

impl Console {
    /// Start the progress printer and the Ctrl-C handler.
    pub fn start() -> Self {
        let control = UploadControl::new();
        let (events, mut rx) = EventSink::channel(64);

        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    UploadEvent::Progress(p) => {
                        let done_mib = p.uploaded_bytes as f64 / 1_048_576.0;
                        let total_mib = p.total_bytes as f64 / 1_048_576.0;
                        let rate_mib = p.speed / 1_048_576.0;
                        let eta = p
                            .eta
                            .map(|d| format!("{:.0}s", d.as_secs_f64()))
                            .unwrap_or_else(|| "?".to_string());
                        eprint!(
                            "\r  {:.1} / {:.1} MiB ({:.1}%)  chunks {}/{}  {:.2} MiB/s  ETA {}  ",
                            done_mib,
                            total_mib,
                            p.percentage,
                            p.chunks_uploaded,
                            p.total_chunks,
                            rate_mib,
                            eta
                        );
                    }
                    UploadEvent::ChunkRetrying {
                        index,
                        attempt,
                        delay,
                    } => {
                        eprintln!(
                            "\n  chunk {} failed, retry {} in {} ms",
                            index,
                            attempt,
                            delay.as_millis()
                        );
                    }
                    UploadEvent::ChunkFailed { index, error } => {
                        eprintln!("\n  chunk {} failed: {}", index, error);
                    }
                    UploadEvent::StateChanged(_) | UploadEvent::ChunkCompleted { .. } => {}
                }
            }
            eprintln!();
        });

        let on_signal = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n  pausing...");
                on_signal.pause();
            }
        });

        Self {
            control,
            events,
            printer,
        }
    }

    /// Close the event stream, wait for the printer, then report the result.
    pub async fn finish(self, result: Result<UploadOutcome, UploadError>) -> Result<()> {
        drop(self.events);
        let _ = self.printer.await;
        report(result)
    }
}

fn report(result: Result<UploadOutcome, UploadError>) -> Result<()> {
    match result {
        Ok(UploadOutcome::Completed(done)) => {
            println!("Uploaded {} -> {}", done.session_id, done.url);
            Ok(())
        }
        Ok(UploadOutcome::Paused {
            session_id,
            progress,
        }) => {
            println!(
                "Paused {} at {}/{} chunks; continue with `chunkup resume {} <file>`",
                session_id, progress.chunks_uploaded, progress.total_chunks, session_id
            );
            Ok(())
        }
        Ok(UploadOutcome::Cancelled { session_id }) => {
            println!("Cancelled {}", session_id);
            Ok(())
        }
        Err(UploadError::Incomplete {
            session_id,
            failed,
            progress,
        }) => {
            println!(
                "Session {} incomplete: {}/{} chunks uploaded, failed chunks {:?}",
                session_id, progress.chunks_uploaded, progress.total_chunks, failed
            );
            println!("Retry with `chunkup resume {} <file>`", session_id);
            anyhow::bail!("upload incomplete: {} chunks failed", failed.len())
        }
        Err(UploadError::Assembly { session_id, source }) => {
            println!("All chunks uploaded but finalize failed: {}", source);
            println!("Retry with `chunkup finalize {}`", session_id);
            anyhow::bail!("finalize failed for session {}", session_id)
        }
        Err(e) => Err(e.into()),
    }
}
