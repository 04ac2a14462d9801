//! Error types for the pool module.

use thiserror::Error;

/// Errors returned by the worker pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// `submit` was called before `start`.
    #[error("Worker pool has not been started")]
    NotStarted,

    /// `start` was called on a pool that is already running.
    #[error("Worker pool is already running")]
    AlreadyStarted,

    /// The pool is stopping or stopped and accepts no more work.
    #[error("Worker pool is closed")]
    Closed,

    /// The task queue is full (only returned by `try_submit`).
    #[error("Worker pool queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The task panicked while running.
    #[error("Task panicked")]
    TaskPanicked,

    /// The task was dropped before producing a result.
    #[error("Task was dropped before completion")]
    TaskDropped,
}

impl PoolError {
    /// Whether the caller should stop issuing work to this pool.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::NotStarted)
    }
}
