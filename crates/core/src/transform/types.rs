//! Types for the transform module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::params::TransformParams;
use crate::media::MediaFormat;

/// A single transform run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformJob {
    /// Identifier used in logs.
    pub job_id: String,
    /// Original downloaded bytes on disk.
    pub input_path: PathBuf,
    /// Where the engine writes the artifact.
    pub output_path: PathBuf,
    /// Format of the artifact.
    pub output_format: MediaFormat,
    /// Nonce-derived parameters.
    pub params: TransformParams,
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformOutput {
    pub job_id: String,
    pub output_path: PathBuf,
    pub size_bytes: u64,
    /// Wall time of the run in milliseconds.
    pub duration_ms: u64,
}
