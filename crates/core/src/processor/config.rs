//! Configuration for the processor module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Deadline for one request (queueing, download, transform, store).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300 // 5 minutes
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ProcessorConfig {
    /// Sets the request timeout in seconds.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
