//! Daemon configuration (§9a): environment-variable loading via `dotenvy`, matching how the
//! ambient stack (persistence, queue, adapters) is wired at startup for a long-running daemon
//! rather than a one-shot CLI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Resolved runtime configuration, loaded once at startup via [`AppConfig::from_env`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub queue_redis_url: String,
    pub rclone_bin: String,
    pub state_dir: PathBuf,
    pub queue_key_prefix: String,
    pub s3_poll_interval: Duration,
    pub scheduler_tick_interval: Duration,
    pub throttle_acquire_timeout: Duration,
    pub adapter_timeout: Duration,
    pub worker_retry_backoff: Duration,
}

impl AppConfig {
    /// Loads `.env` (if present) then reads the process environment. `DATABASE_URL` and
    /// `QUEUE_REDIS_URL` are required; everything else falls back to the defaults in §9a.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(_) | Err(dotenvy::Error::Io(_)) => {}
            Err(e) => return Err(e).context("failed to parse .env"),
        }

        let state_dir = PathBuf::from(env_or("STATE_DIR", "./state"));

        Ok(Self {
            database_url: require_env("DATABASE_URL")?,
            queue_redis_url: require_env("QUEUE_REDIS_URL")?,
            rclone_bin: env_or("RCLONE_BIN", "rclone"),
            state_dir,
            queue_key_prefix: env_or("QUEUE_KEY_PREFIX", "xfer"),
            s3_poll_interval: Duration::from_secs(env_u64("S3_POLL_INTERVAL_SECS", 30)?),
            scheduler_tick_interval: Duration::from_secs(env_u64("SCHEDULER_TICK_SECS", 60)?),
            throttle_acquire_timeout: Duration::from_secs(env_u64("THROTTLE_ACQUIRE_TIMEOUT_SECS", 30)?),
            adapter_timeout: Duration::from_secs(env_u64("ADAPTER_TIMEOUT_SECS", 30)?),
            worker_retry_backoff: Duration::from_secs(env_u64("WORKER_RETRY_BACKOFF_SECS", 5)?),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required environment variable {key}"))
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(v) => v.parse::<u64>().with_context(|| format!("{key} must be a non-negative integer, got '{v}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_u64_falls_back_to_default_when_unset() {
        std::env::remove_var("XFER_TEST_UNSET_VAR");
        assert_eq!(env_u64("XFER_TEST_UNSET_VAR", 42).unwrap(), 42);
    }

    #[test]
    fn env_u64_rejects_non_numeric_values() {
        std::env::set_var("XFER_TEST_BAD_VAR", "not-a-number");
        assert!(env_u64("XFER_TEST_BAD_VAR", 1).is_err());
        std::env::remove_var("XFER_TEST_BAD_VAR");
    }
}
