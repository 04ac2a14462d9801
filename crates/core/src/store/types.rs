//! Types for the ephemeral store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::time::Instant;

use crate::media::{MediaFormat, MediaKind};

/// A stored artifact and its originating input.
#[derive(Debug, Clone, Serialize)]
pub struct TempObject {
    /// Opaque 32-char hex id.
    pub id: String,
    /// Transformed output file.
    pub artifact_path: PathBuf,
    /// Original downloaded input, if kept alongside.
    pub source_path: Option<PathBuf>,
    pub media_kind: MediaKind,
    /// Format of the artifact.
    pub format: MediaFormat,
    pub created_at: DateTime<Utc>,
    /// `created_at + TTL`; fixed at insert.
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
    #[serde(skip)]
    pub(crate) deadline: Instant,
}

impl TempObject {
    /// Whether the object is past its expiry.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Files owned by this entry (source skipped when it equals the artifact).
    pub(crate) fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.artifact_path.clone()];
        if let Some(source) = &self.source_path {
            if source != &self.artifact_path {
                files.push(source.clone());
            }
        }
        files
    }
}

/// Which eviction path removed an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPath {
    /// The one-shot timer scheduled at insert.
    Timer,
    /// The periodic sweep.
    Sweep,
}

impl EvictionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPath::Timer => "timer",
            EvictionPath::Sweep => "sweep",
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Logically live entries.
    pub entries: usize,
    /// Total artifact bytes of live entries.
    pub total_bytes: u64,
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub timer_evictions: u64,
    pub sweep_evictions: u64,
}
