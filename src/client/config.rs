//! Edge client configuration.

use std::path::PathBuf;
use std::time::Duration;

use super::{RunnerConfig, SyncConfig};
use crate::server::parse_env;

/// Edge client configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the ingestion service (without the `/scan` path)
    pub server_url: String,
    /// Path of the durable pending-scan queue
    pub queue_path: PathBuf,
    /// Upper bound on each delivery attempt
    pub request_timeout: Duration,
    /// Records fetched from the queue per sync batch
    pub sync_batch_limit: u32,
    /// Pause after each scan before the reader is polled again
    pub scan_cooldown: Duration,
    /// How often a non-empty queue is retried while no card is presented
    pub retry_interval: Duration,
    /// Suppress the terminal bell
    pub silent: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let runner = RunnerConfig::default();
        Self {
            server_url: "http://localhost:5000".to_string(),
            queue_path: PathBuf::from("pending_scans.db"),
            request_timeout: Duration::from_millis(2000),
            sync_batch_limit: SyncConfig::default().batch_limit,
            scan_cooldown: runner.scan_cooldown,
            retry_interval: runner.retry_interval,
            silent: false,
        }
    }
}

/// Read a duration given in milliseconds
fn env_millis(key: &str, default: Duration) -> anyhow::Result<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_env(key, default_ms).map(Duration::from_millis)
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let server_url = std::env::var("SERVER_URL")
            .map(|v| v.trim().to_string())
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.server_url);

        let queue_path = std::env::var("QUEUE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.queue_path);

        let request_timeout = env_millis("REQUEST_TIMEOUT_MS", defaults.request_timeout)?;
        let sync_batch_limit: u32 = parse_env("SYNC_BATCH_LIMIT", defaults.sync_batch_limit)?;
        let scan_cooldown = env_millis("SCAN_COOLDOWN_MS", defaults.scan_cooldown)?;
        let retry_interval = env_millis("SYNC_RETRY_INTERVAL_MS", defaults.retry_interval)?;

        let silent = std::env::var("SCAN_CLIENT_SILENT")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "on"))
            .unwrap_or(false);

        if request_timeout.is_zero() {
            anyhow::bail!("REQUEST_TIMEOUT_MS must be greater than zero");
        }
        if sync_batch_limit == 0 {
            anyhow::bail!("SYNC_BATCH_LIMIT must be greater than zero");
        }
        if retry_interval.is_zero() {
            anyhow::bail!("SYNC_RETRY_INTERVAL_MS must be greater than zero");
        }

        Ok(Self {
            server_url,
            queue_path,
            request_timeout,
            sync_batch_limit,
            scan_cooldown,
            retry_interval,
            silent,
        })
    }

    /// Full URL of the scan ingestion route
    pub fn scan_endpoint(&self) -> String {
        format!("{}/scan", self.server_url.trim_end_matches('/'))
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            batch_limit: self.sync_batch_limit,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            scan_cooldown: self.scan_cooldown,
            retry_interval: self.retry_interval,
        }
    }
}
