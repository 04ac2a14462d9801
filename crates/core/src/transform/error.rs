//! Error types for the transform module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running the transform engine.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Engine binary not found.
    #[error("Transform engine not found at path: {path}")]
    EngineNotFound { path: PathBuf },

    /// Engine exited unsuccessfully.
    #[error("Transform engine failed (exit code {exit_code:?}): {stderr}")]
    EngineFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Engine reported success but wrote nothing.
    #[error("Output file not created: {path}")]
    MissingOutput { path: PathBuf },

    /// Output exists but is empty.
    #[error("Output file is empty: {path}")]
    EmptyOutput { path: PathBuf },

    /// Run exceeded its timeout.
    #[error("Transform timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Decoding or re-encoding pixels failed.
    #[error("Pixel adjustment failed: {0}")]
    Pixels(#[from] image::ImageError),

    /// I/O error around the engine process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    /// Creates an engine failure from an exit code and captured stderr.
    pub fn engine_failed(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::EngineFailed {
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EngineNotFound { .. } => "not_found",
            Self::EngineFailed { .. } => "engine_failed",
            Self::MissingOutput { .. } => "missing_output",
            Self::EmptyOutput { .. } => "empty_output",
            Self::Timeout { .. } => "timeout",
            Self::Pixels(_) => "pixels",
            Self::Io(_) => "io",
        }
    }
}
