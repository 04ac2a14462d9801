//! Mock transformer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::transform::{TransformError, TransformJob, TransformOutput, Transformer};

/// A recorded transform job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTransform {
    /// The job that was submitted.
    pub job: TransformJob,
    /// Whether the transform succeeded.
    pub success: bool,
}

/// Mock implementation of the Transformer trait.
///
/// Writes the input bytes followed by the serialized job parameters, so two
/// runs over the same input produce different artifacts.
///
/// # Example
///
/// ```rust,ignore
/// use recast_core::testing::MockTransformer;
///
/// let transformer = MockTransformer::new();
/// transformer.set_next_error(TransformError::engine_failed(Some(1), "boom")).await;
///
/// let result = transformer.transform(job).await;
/// assert!(result.is_err());
/// assert_eq!(transformer.transform_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockTransformer {
    transforms: Arc<RwLock<Vec<RecordedTransform>>>,
    /// If set, the next transform will fail with this error.
    next_error: Arc<RwLock<Option<TransformError>>>,
    /// Simulated run duration in milliseconds.
    duration_ms: Arc<RwLock<u64>>,
    /// Report success without writing output.
    skip_output: Arc<RwLock<bool>>,
}

impl Default for MockTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransformer {
    /// Create a new mock transformer.
    pub fn new() -> Self {
        Self {
            transforms: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            duration_ms: Arc::new(RwLock::new(0)),
            skip_output: Arc::new(RwLock::new(false)),
        }
    }

    /// Get all recorded transforms.
    pub async fn recorded_transforms(&self) -> Vec<RecordedTransform> {
        self.transforms.read().await.clone()
    }

    /// Get the number of transforms performed.
    pub async fn transform_count(&self) -> usize {
        self.transforms.read().await.len()
    }

    /// Configure the next transform to fail with the given error.
    pub async fn set_next_error(&self, error: TransformError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated run duration.
    pub async fn set_duration(&self, duration: Duration) {
        *self.duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Report success without writing any output file.
    pub async fn set_skip_output(&self, skip: bool) {
        *self.skip_output.write().await = skip;
    }

    async fn record(&self, job: TransformJob, success: bool) {
        self.transforms
            .write()
            .await
            .push(RecordedTransform { job, success });
    }
}

#[async_trait]
impl Transformer for MockTransformer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transform(&self, job: TransformJob) -> Result<TransformOutput, TransformError> {
        let start = Instant::now();

        let delay = *self.duration_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            self.record(job, false).await;
            return Err(err);
        }

        let mut size_bytes = 0;
        if !*self.skip_output.read().await {
            let mut data = tokio::fs::read(&job.input_path).await?;
            let params = serde_json::to_vec(&job.params)
                .map_err(|e| TransformError::Io(std::io::Error::other(e)))?;
            data.extend_from_slice(&params);
            tokio::fs::write(&job.output_path, &data).await?;
            size_bytes = data.len() as u64;
        }

        let output = TransformOutput {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        self.record(job, true).await;
        Ok(output)
    }

    async fn validate(&self) -> Result<(), TransformError> {
        Ok(())
    }

    async fn version(&self) -> Option<String> {
        Some("mock 1.0".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaFormat;
    use crate::nonce::NonceEngine;
    use crate::transform::TransformParams;
    use tempfile::TempDir;

    fn job(tmp: &TempDir, name: &str) -> TransformJob {
        let input = tmp.path().join("in.original.mp3");
        std::fs::write(&input, b"ID3 input bytes").unwrap();
        TransformJob {
            job_id: name.to_string(),
            input_path: input,
            output_path: tmp.path().join(format!("{}.mp3", name)),
            output_format: MediaFormat::Mp3,
            params: TransformParams::derive(MediaFormat::Mp3, &NonceEngine::new().generate()),
        }
    }

    #[tokio::test]
    async fn test_outputs_differ_per_run() {
        let tmp = TempDir::new().unwrap();
        let transformer = MockTransformer::new();

        let a = transformer.transform(job(&tmp, "a")).await.unwrap();
        let b = transformer.transform(job(&tmp, "b")).await.unwrap();

        let a = std::fs::read(a.output_path).unwrap();
        let b = std::fs::read(b.output_path).unwrap();
        assert!(a.starts_with(b"ID3 input bytes"));
        assert_ne!(a, b);
        assert_eq!(transformer.transform_count().await, 2);
    }

    #[tokio::test]
    async fn test_next_error_is_consumed() {
        let tmp = TempDir::new().unwrap();
        let transformer = MockTransformer::new();
        transformer
            .set_next_error(TransformError::engine_failed(Some(1), "boom"))
            .await;

        assert!(transformer.transform(job(&tmp, "a")).await.is_err());
        assert!(transformer.transform(job(&tmp, "b")).await.is_ok());

        let recorded = transformer.recorded_transforms().await;
        assert!(!recorded[0].success);
        assert!(recorded[1].success);
    }
}
