pub mod config;
pub mod download;
pub mod media;
pub mod metrics;
pub mod nonce;
pub mod pool;
pub mod processor;
pub mod store;
pub mod testing;
pub mod transform;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, ServerConfig,
};
pub use download::{DownloadError, Downloader, DownloaderConfig};
pub use media::{MediaFormat, MediaKind};
pub use nonce::{NonceEngine, ProcessingNonce};
pub use pool::{BufferPool, PoolConfig, PoolError, PoolState, PoolStatus, WorkerPool};
pub use processor::{PipelineError, ProcessOutcome, ProcessingPipeline, ProcessorConfig};
pub use store::{EphemeralStore, StoreConfig, StoreError, StoreStats, TempObject};
pub use transform::{FfmpegTransformer, TransformError, Transformer, TransformerConfig};
