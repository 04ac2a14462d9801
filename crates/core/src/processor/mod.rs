//! Processing pipeline.
//!
//! [`ProcessingPipeline`] drives one request from a source URL to a stored
//! artifact: detect format, download, write scratch input, transform, verify
//! the output and register it with the ephemeral store. The heavy part runs on
//! the [`WorkerPool`](crate::pool::WorkerPool) under a per-request deadline.
//!
//! # Example
//!
//! ```ignore
//! use recast_core::processor::{ProcessingPipeline, ProcessorConfig};
//!
//! let pipeline = ProcessingPipeline::new(
//!     ProcessorConfig::default(),
//!     downloader,
//!     transformer,
//!     store,
//!     workers,
//! );
//!
//! let outcome = pipeline.process("https://cdn.example.com/clip.mp4").await?;
//! println!("Stored {} until {}", outcome.id, outcome.expires_at);
//! ```

mod config;
mod error;
mod pipeline;
mod types;

pub use config::ProcessorConfig;
pub use error::PipelineError;
pub use pipeline::ProcessingPipeline;
pub use types::{PipelineStatus, ProcessOutcome};
