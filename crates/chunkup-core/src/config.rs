use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries per chunk after the first attempt.
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds; doubled for every further retry.
    pub retry_delay_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30_000,
        }
    }
}

/// Global configuration loaded from `~/.config/chunkup/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkupConfig {
    /// Base URL of the upload service (`{endpoint}/chunks`, `{endpoint}/finalize`).
    pub endpoint: Option<String>,
    /// Chunk size in bytes. Fixed for the life of a session once it is created.
    pub chunk_size: u64,
    /// Maximum number of chunk transfers in flight at once.
    pub max_concurrent_uploads: usize,
    /// Hash every chunk at planning time and send/verify the digest.
    pub validate_chunks: bool,
    /// Sessions idle for longer than this are removed by cleanup.
    pub session_retention_days: u64,
    /// Upper bound on a single chunk transfer attempt.
    pub chunk_timeout_secs: u64,
    /// How often progress is re-emitted while chunks are streaming.
    pub progress_interval_ms: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
}

impl Default for ChunkupConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_uploads: 3,
            validate_chunks: true,
            session_retention_days: 7,
            chunk_timeout_secs: 120,
            progress_interval_ms: 500,
            retry: None,
        }
    }
}

impl ChunkupConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }
        if self.max_concurrent_uploads == 0 {
            bail!("max_concurrent_uploads must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = self.retry.clone().unwrap_or_default();
        RetryPolicy {
            max_retries: retry.retry_attempts,
            base_delay: Duration::from_millis(retry.retry_delay_ms),
            max_delay: Duration::from_millis(retry.max_retry_delay_ms),
        }
    }

    pub fn session_retention(&self) -> Duration {
        Duration::from_secs(self.session_retention_days.saturating_mul(24 * 60 * 60))
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs.max(1))
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(10))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("chunkup")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ChunkupConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ChunkupConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load and validate configuration from a specific file.
pub fn load_from(path: &Path) -> Result<ChunkupConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: ChunkupConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ChunkupConfig::default();
        assert_eq!(cfg.chunk_size, 1024 * 1024);
        assert_eq!(cfg.max_concurrent_uploads, 3);
        assert!(cfg.validate_chunks);
        assert_eq!(cfg.session_retention_days, 7);
        assert!(cfg.endpoint.is_none());

        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ChunkupConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ChunkupConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.chunk_size, cfg.chunk_size);
        assert_eq!(parsed.max_concurrent_uploads, cfg.max_concurrent_uploads);
        assert_eq!(parsed.validate_chunks, cfg.validate_chunks);
    }

    #[test]
    fn config_toml_partial_uses_defaults() {
        let toml = r#"
            endpoint = "https://uploads.example.com/api/"
            chunk_size = 4_194_304
        "#;
        let cfg: ChunkupConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.endpoint.as_deref(), Some("https://uploads.example.com/api/"));
        assert_eq!(cfg.chunk_size, 4 * 1024 * 1024);
        assert_eq!(cfg.max_concurrent_uploads, 3);
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn config_toml_retry_section() {
        let toml = r#"
            max_concurrent_uploads = 6
            validate_chunks = false

            [retry]
            retry_attempts = 5
            retry_delay_ms = 250
            max_retry_delay_ms = 4000
        "#;
        let cfg: ChunkupConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_uploads, 6);
        assert!(!cfg.validate_chunks);
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_millis(4000));
    }

    #[test]
    fn validate_rejects_zero_chunk_size_and_concurrency() {
        let mut cfg = ChunkupConfig::default();
        cfg.chunk_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ChunkupConfig::default();
        cfg.max_concurrent_uploads = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn retention_is_expressed_in_days() {
        let cfg = ChunkupConfig::default();
        assert_eq!(cfg.session_retention(), Duration::from_secs(7 * 86_400));
    }
}
