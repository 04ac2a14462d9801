//! Pipeline implementation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::download::{truncate_url, Downloader};
use crate::media::MediaFormat;
use crate::metrics;
use crate::nonce::NonceEngine;
use crate::pool::WorkerPool;
use crate::store::{generate_id, EphemeralStore};
use crate::transform::{output_size, TransformJob, TransformParams, Transformer};

use super::config::ProcessorConfig;
use super::error::PipelineError;
use super::types::{PipelineStatus, ProcessOutcome};

#[derive(Default)]
struct PipelineStats {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Scratch files created by one job. Dropping the guard deletes them unless
/// ownership was handed to the store with [`disarm`](Self::disarm).
struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    fn new() -> Self {
        Self { paths: Vec::new() }
    }

    fn track(&mut self, path: &Path) {
        self.paths.push(path.to_path_buf());
    }

    fn disarm(mut self) {
        self.paths.clear();
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
            }
        }
    }
}

/// Everything a job needs once it leaves the caller's task.
#[derive(Clone)]
struct JobContext {
    downloader: Arc<Downloader>,
    transformer: Arc<dyn Transformer>,
    store: Arc<EphemeralStore>,
    nonces: Arc<NonceEngine>,
}

impl JobContext {
    async fn run(self, url: String, format: MediaFormat) -> Result<ProcessOutcome, PipelineError> {
        let data = self.downloader.download(&url).await?;

        let stem = generate_id();
        let output_format = format.output_format();
        let input_path = self
            .store
            .scratch_path(&format!("{}.original.{}", stem, format.extension()));
        let output_path = self
            .store
            .scratch_path(&format!("{}.{}", stem, output_format.extension()));

        let mut scratch = ScratchFiles::new();
        scratch.track(&input_path);
        tokio::fs::write(&input_path, &data)
            .await
            .map_err(PipelineError::Scratch)?;
        drop(data);
        scratch.track(&output_path);

        let nonce = self.nonces.generate();
        let job = TransformJob {
            job_id: stem,
            input_path: input_path.clone(),
            output_path: output_path.clone(),
            output_format,
            params: TransformParams::derive(format, &nonce),
        };

        let kind = format.kind().as_str();
        let started = Instant::now();
        let result = self.transformer.transform(job).await;
        metrics::TRANSFORM_DURATION
            .with_label_values(&[kind])
            .observe(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => metrics::TRANSFORMS_TOTAL
                .with_label_values(&[kind, "success"])
                .inc(),
            Err(e) => metrics::TRANSFORMS_TOTAL
                .with_label_values(&[kind, e.label()])
                .inc(),
        }
        result?;

        // Trust the filesystem, not the engine's report.
        output_size(&output_path).await?;

        let object = self
            .store
            .store(&output_path, Some(&input_path), output_format)
            .await?;
        scratch.disarm();

        Ok(ProcessOutcome {
            id: object.id,
            media_kind: object.media_kind,
            format: object.format,
            size_bytes: object.size_bytes,
            expires_at: object.expires_at,
        })
    }
}

/// Orchestrates download, transform and store for each request.
pub struct ProcessingPipeline {
    config: ProcessorConfig,
    ctx: JobContext,
    workers: Arc<WorkerPool>,
    stats: PipelineStats,
}

impl ProcessingPipeline {
    /// Creates a new pipeline. The worker pool must be started separately.
    pub fn new(
        config: ProcessorConfig,
        downloader: Arc<Downloader>,
        transformer: Arc<dyn Transformer>,
        store: Arc<EphemeralStore>,
        workers: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config,
            ctx: JobContext {
                downloader,
                transformer,
                store,
                nonces: Arc::new(NonceEngine::new()),
            },
            workers,
            stats: PipelineStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<EphemeralStore> {
        &self.ctx.store
    }

    pub fn transformer(&self) -> &Arc<dyn Transformer> {
        &self.ctx.transformer
    }

    pub fn workers(&self) -> &Arc<WorkerPool> {
        &self.workers
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            processed: self.stats.processed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            workers: self.workers.status(),
        }
    }

    /// Processes `url` and returns the stored artifact's id.
    ///
    /// Input validation runs on the caller's task; the rest runs on the worker
    /// pool. On any failure every scratch file is removed and nothing is
    /// registered in the store.
    pub async fn process(&self, url: &str) -> Result<ProcessOutcome, PipelineError> {
        let started = Instant::now();
        let result = self.process_inner(url).await;

        match &result {
            Ok(outcome) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                metrics::PIPELINE_REQUESTS
                    .with_label_values(&["success"])
                    .inc();
                info!(
                    id = %outcome.id,
                    kind = %outcome.media_kind,
                    format = %outcome.format,
                    size_bytes = outcome.size_bytes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Processing complete"
                );
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                metrics::PIPELINE_REQUESTS
                    .with_label_values(&[e.stage()])
                    .inc();
                warn!(
                    url = %truncate_url(url),
                    stage = e.stage(),
                    error = %e,
                    "Processing failed"
                );
            }
        }
        result
    }

    async fn process_inner(&self, url: &str) -> Result<ProcessOutcome, PipelineError> {
        let parsed = self.ctx.downloader.validate_url(url)?;
        let format = MediaFormat::from_url(&parsed).ok_or_else(|| PipelineError::UnsupportedMedia {
            url: truncate_url(url),
        })?;

        info!(url = %truncate_url(url), format = %format, "Processing request");

        let timeout_secs = self.config.request_timeout_secs;
        let deadline = tokio::time::Instant::now() + self.config.request_timeout();
        let ctx = self.ctx.clone();
        let url = parsed.to_string();

        let job = async move {
            if tokio::time::Instant::now() >= deadline {
                return Err(PipelineError::Timeout { timeout_secs });
            }
            tokio::time::timeout_at(deadline, ctx.run(url, format))
                .await
                .unwrap_or(Err(PipelineError::Timeout { timeout_secs }))
        };

        let handle = tokio::time::timeout_at(deadline, self.workers.submit(job))
            .await
            .map_err(|_| PipelineError::Timeout { timeout_secs })??;

        // Also bounds time spent queued behind busy workers.
        tokio::time::timeout_at(deadline, handle.join())
            .await
            .map_err(|_| PipelineError::Timeout { timeout_secs })??
    }
}

impl std::fmt::Debug for ProcessingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingPipeline")
            .field("config", &self.config)
            .field("transformer", &self.ctx.transformer.name())
            .finish()
    }
}
