use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recast_core::{
    load_config_or_default, validate_config, BufferPool, Downloader, EphemeralStore,
    FfmpegTransformer, ProcessingPipeline, Transformer, WorkerPool,
};

use recast_server::api::create_router;
use recast_server::metrics;
use recast_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("RECAST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Storage dir: {:?}, TTL: {}s", config.storage.dir, config.storage.ttl_secs);

    metrics::init();

    // Buffer pool shared by all downloads
    let buffers = Arc::new(BufferPool::new(
        config.pool.buffer_count,
        config.pool.buffer_size_bytes,
    ));

    // Worker pool bounding concurrent jobs
    let workers = Arc::new(WorkerPool::from_config(&config.pool));
    workers.start().context("Failed to start worker pool")?;
    info!(
        workers = config.pool.workers,
        queue_capacity = config.pool.queue_capacity,
        "Worker pool started"
    );

    let downloader = Arc::new(
        Downloader::new(config.downloader.clone(), Arc::clone(&buffers))
            .context("Failed to create downloader")?,
    );

    let transformer = FfmpegTransformer::new(config.transformer.clone());
    match transformer.validate().await {
        Ok(()) => info!(
            version = %transformer.version().await.unwrap_or_default(),
            "Transform engine available"
        ),
        Err(e) => warn!(error = %e, "Transform engine not available, requests will fail"),
    }
    let transformer: Arc<dyn Transformer> = Arc::new(transformer);

    let store = Arc::new(
        EphemeralStore::open(config.storage.clone())
            .await
            .context("Failed to open ephemeral store")?,
    );
    info!("Ephemeral store opened at {:?}", store.dir());

    let pipeline = Arc::new(ProcessingPipeline::new(
        config.processor.clone(),
        downloader,
        transformer,
        Arc::clone(&store),
        Arc::clone(&workers),
    ));

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), pipeline, buffers));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    // Let queued jobs finish before the store stops sweeping
    workers.stop().await;
    info!("Worker pool stopped");

    store.stop();
    info!("Ephemeral store stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
