use std::sync::Arc;
use recast_core::{BufferPool, Config, ProcessingPipeline};

/// Shared application state
pub struct AppState {
    config: Config,
    pipeline: Arc<ProcessingPipeline>,
    buffers: Arc<BufferPool>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Arc<ProcessingPipeline>, buffers: Arc<BufferPool>) -> Self {
        Self {
            config,
            pipeline,
            buffers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &ProcessingPipeline {
        &self.pipeline
    }

    pub fn buffers(&self) -> &BufferPool {
        &self.buffers
    }
}
