//! Trait definitions for the transform module.

use async_trait::async_trait;

use super::error::TransformError;
use super::types::{TransformJob, TransformOutput};

/// An engine that re-encodes one media file into another.
///
/// Implementations must treat a zero exit plus a non-empty output file as
/// success and anything else as failure.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Returns the name of this transformer implementation.
    fn name(&self) -> &str;

    /// Runs the job and returns the produced artifact.
    async fn transform(&self, job: TransformJob) -> Result<TransformOutput, TransformError>;

    /// Validates that the engine is installed and runnable.
    async fn validate(&self) -> Result<(), TransformError>;

    /// Engine version string, if available.
    async fn version(&self) -> Option<String>;
}
