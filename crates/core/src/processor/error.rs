//! Error types for the processor module.

use thiserror::Error;

use crate::download::DownloadError;
use crate::pool::PoolError;
use crate::store::StoreError;
use crate::transform::TransformError;

/// Error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The URL does not name a supported media format.
    #[error("Unsupported media type: {url}")]
    UnsupportedMedia { url: String },

    /// Download failed.
    #[error("Failed to download file: {0}")]
    Download(#[from] DownloadError),

    /// The transform engine failed.
    #[error("Processing failed: {0}")]
    Transform(#[from] TransformError),

    /// The artifact could not be registered.
    #[error("Failed to store file: {0}")]
    Store(#[from] StoreError),

    /// The worker pool rejected or lost the job.
    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// Writing the scratch input failed.
    #[error("Failed to save original file: {0}")]
    Scratch(#[source] std::io::Error),

    /// The request deadline elapsed.
    #[error("Processing timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl PipelineError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnsupportedMedia { .. } => "validate",
            Self::Download(DownloadError::InvalidUrl { .. })
            | Self::Download(DownloadError::InvalidScheme { .. }) => "validate",
            Self::Download(_) => "download",
            Self::Transform(_) => "transform",
            Self::Store(_) => "store",
            Self::Pool(_) => "pool",
            Self::Scratch(_) => "scratch",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Whether the failure was caused by the request (bad URL or payload).
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::UnsupportedMedia { .. } => true,
            Self::Download(e) => e.is_client_error(),
            _ => false,
        }
    }

    /// Whether the pool is shutting down and no more work will be accepted.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Pool(e) if e.is_closed())
    }
}
