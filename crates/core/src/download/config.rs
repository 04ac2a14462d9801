//! Configuration for the downloader module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`Downloader`](super::Downloader).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Largest accepted payload in bytes.
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,

    /// Smallest plausible payload in bytes.
    #[serde(default = "default_min_size")]
    pub min_size_bytes: u64,

    /// Per-attempt request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Total attempts for transient failures (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff; attempt `n` waits `n * base` before retrying.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// URL schemes that may be fetched.
    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,
}

fn default_max_size() -> u64 {
    500 * 1024 * 1024
}

fn default_min_size() -> u64 {
    100
}

fn default_timeout() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size(),
            min_size_bytes: default_min_size(),
            timeout_secs: default_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            allowed_schemes: default_allowed_schemes(),
        }
    }
}

impl DownloaderConfig {
    /// Sets the size limits.
    pub fn with_size_limits(mut self, min_size_bytes: u64, max_size_bytes: u64) -> Self {
        self.min_size_bytes = min_size_bytes;
        self.max_size_bytes = max_size_bytes;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.max_attempts = max_attempts;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// Sets the per-attempt timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}
