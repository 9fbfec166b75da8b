//! CLI for the chunkup upload engine.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use chunkup_core::config::{self, ChunkupConfig};
use chunkup_core::session::{SessionStore, SqliteSessionDb};
use std::path::PathBuf;

use commands::{
    run_cancel, run_cleanup, run_completions, run_finalize, run_resume, run_status, run_upload,
    UploadOverrides,
};

/// Top-level CLI for the chunkup upload engine.
#[derive(Debug, Parser)]
#[command(name = "chunkup")]
#[command(about = "chunkup: resumable, integrity-checked chunked uploads", long_about = None)]
pub struct Cli {
    /// Upload service base URL (overrides `endpoint` in config.toml).
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload a file as a new session.
    Upload {
        /// File to upload.
        path: PathBuf,
        /// Content type to declare (default: guessed from the extension).
        #[arg(long = "type", value_name = "MIME")]
        file_type: Option<String>,
        /// Chunk size in bytes.
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u64>,
        /// Maximum chunk transfers in flight.
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Skip per-chunk digests (faster planning, weaker resume checks).
        #[arg(long)]
        no_validate: bool,
    },

    /// Resume a paused or interrupted session with the same file.
    Resume {
        /// Session identifier (see `chunkup status`).
        session_id: String,
        /// The file originally uploaded under this session.
        path: PathBuf,
        /// Content type declared when the session was created.
        #[arg(long = "type", value_name = "MIME")]
        file_type: Option<String>,
    },

    /// Retry server-side assembly of a fully uploaded session.
    Finalize {
        /// Session identifier.
        session_id: String,
    },

    /// List stored sessions and their progress.
    Status,

    /// Discard a stored session.
    Cancel {
        /// Session identifier.
        session_id: String,
    },

    /// Remove sessions idle for longer than the retention window.
    Cleanup {
        /// Retention in days (default: `session_retention_days` from config).
        #[arg(long, value_name = "DAYS")]
        days: Option<u64>,
    },

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn endpoint(cli_endpoint: Option<String>, cfg: &ChunkupConfig) -> Result<String> {
    cli_endpoint
        .or_else(|| cfg.endpoint.clone())
        .context("no upload endpoint: pass --endpoint or set `endpoint` in config.toml")
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Completions { shell } = cli.command {
            run_completions(shell);
            return Ok(());
        }

        let cfg = config::load_or_init()?;
        cfg.validate()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let db = SqliteSessionDb::open_default().await?;

        match cli.command {
            CliCommand::Upload {
                path,
                file_type,
                chunk_size,
                concurrency,
                no_validate,
            } => {
                let endpoint = endpoint(cli.endpoint, &cfg)?;
                let overrides = UploadOverrides {
                    file_type,
                    chunk_size,
                    concurrency,
                    no_validate,
                };
                let store = SessionStore::with_retention(db, cfg.session_retention());
                run_upload(store, &cfg, &endpoint, &path, overrides).await?;
            }
            CliCommand::Resume {
                session_id,
                path,
                file_type,
            } => {
                let endpoint = endpoint(cli.endpoint, &cfg)?;
                let store = SessionStore::with_retention(db, cfg.session_retention());
                run_resume(store, &cfg, &endpoint, &session_id, &path, file_type).await?;
            }
            CliCommand::Finalize { session_id } => {
                let endpoint = endpoint(cli.endpoint, &cfg)?;
                let store = SessionStore::with_retention(db, cfg.session_retention());
                run_finalize(store, &cfg, &endpoint, &session_id).await?;
            }
            CliCommand::Status => run_status(&db).await?,
            CliCommand::Cancel { session_id } => run_cancel(&db, &session_id).await?,
            CliCommand::Cleanup { days } => {
                let retention = match days {
                    Some(d) => std::time::Duration::from_secs(d.saturating_mul(24 * 60 * 60)),
                    None => cfg.session_retention(),
                };
                run_cleanup(SessionStore::with_retention(db, retention)).await?;
            }
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
