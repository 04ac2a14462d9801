//! Bounded execution and memory pools.
//!
//! - [`WorkerPool`] caps how many processing jobs run at once. Jobs are futures
//!   queued on a bounded channel and pulled by a fixed set of worker tasks.
//! - [`BufferPool`] hands out pre-sized byte buffers so repeated downloads do
//!   not reallocate large regions every time.
//!
//! # Example
//!
//! ```ignore
//! use recast_core::pool::{WorkerPool, BufferPool};
//!
//! let workers = WorkerPool::new(4, 256);
//! workers.start()?;
//!
//! let handle = workers.submit(async { 21 * 2 }).await?;
//! assert_eq!(handle.join().await?, 42);
//!
//! workers.stop().await;
//! ```

mod buffer;
mod config;
mod error;
mod worker;

pub use buffer::{BufferHandle, BufferPool, BufferPoolStats};
pub use config::PoolConfig;
pub use error::PoolError;
pub use worker::{PoolState, PoolStatus, TaskHandle, WorkerPool};
