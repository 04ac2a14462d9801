//! Configuration for the ephemeral store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for [`EphemeralStore`](super::EphemeralStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding scratch inputs and produced artifacts.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Lifetime of every stored object, in seconds. Never renewed.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Sweep interval in seconds. Defaults to a tenth of the TTL.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

fn default_dir() -> PathBuf {
    std::env::temp_dir().join("recast").join("temp")
}

fn default_ttl() -> u64 {
    600 // 10 minutes
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            ttl_secs: default_ttl(),
            sweep_interval_secs: None,
        }
    }
}

impl StoreConfig {
    /// Creates a config rooted at `dir` with default TTL.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Sets the TTL in seconds.
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Effective sweep interval: explicit value, or TTL/10, never below 1s.
    pub fn sweep_interval(&self) -> Duration {
        let secs = self
            .sweep_interval_secs
            .unwrap_or(self.ttl_secs / 10)
            .max(1);
        Duration::from_secs(secs)
    }
}
