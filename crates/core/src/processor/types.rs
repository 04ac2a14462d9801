//! Types for the processor module.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::media::{MediaFormat, MediaKind};
use crate::pool::PoolStatus;

/// Result of a successful request.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    /// Opaque store id of the artifact.
    pub id: String,
    pub media_kind: MediaKind,
    /// Format of the artifact (may differ from the source).
    pub format: MediaFormat,
    pub size_bytes: u64,
    pub expires_at: DateTime<Utc>,
}

/// Overall pipeline status.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    /// Requests that produced an artifact.
    pub processed: u64,
    /// Requests that failed at any stage.
    pub failed: u64,
    /// Worker pool running the jobs.
    pub workers: PoolStatus,
}
