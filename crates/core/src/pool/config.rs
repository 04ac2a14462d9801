//! Configuration for the worker and buffer pools.

use serde::{Deserialize, Serialize};

/// Pool sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of queued tasks waiting for a worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum number of idle buffers retained by the buffer pool.
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,

    /// Size of each pooled buffer in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size_bytes: usize,
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_buffer_count() -> usize {
    16
}

fn default_buffer_size() -> usize {
    10 * 1024 * 1024 // 10 MiB
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            buffer_count: default_buffer_count(),
            buffer_size_bytes: default_buffer_size(),
        }
    }
}

impl PoolConfig {
    /// Sets the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the buffer size in bytes.
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size_bytes = bytes;
        self
    }
}
