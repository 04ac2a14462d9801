//! Error types for the ephemeral store.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`EphemeralStore`](super::EphemeralStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The artifact to register could not be stat'd.
    #[error("Artifact not found: {path}")]
    ArtifactMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store directory could not be created.
    #[error("Failed to create store directory {path}: {source}")]
    DirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TTL or sweep interval is zero or too far out to schedule.
    #[error("Invalid store timing: ttl {ttl:?}, sweep interval {sweep_interval:?}")]
    InvalidTiming {
        ttl: Duration,
        sweep_interval: Duration,
    },
}
