//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Downloader (attempts, bytes fetched)
//! - Transformer (runs by media kind, duration)
//! - Ephemeral store (evictions by path)
//! - Pipeline (requests by result)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Downloader
// =============================================================================

/// Download attempts by result.
pub static DOWNLOAD_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("recast_download_attempts_total", "Total download attempts"),
        &["result"], // "success", or the error label
    )
    .unwrap()
});

/// Bytes successfully downloaded.
pub static DOWNLOADED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "recast_downloaded_bytes_total",
        "Total bytes of successfully downloaded payloads",
    )
    .unwrap()
});

// =============================================================================
// Transformer
// =============================================================================

/// Transform runs by media kind and result.
pub static TRANSFORMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("recast_transforms_total", "Total transform runs"),
        &["kind", "result"],
    )
    .unwrap()
});

/// Transform duration in seconds.
pub static TRANSFORM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "recast_transform_duration_seconds",
            "Duration of a single transform run",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Ephemeral Store
// =============================================================================

/// Entries evicted, by the path that removed them.
pub static STORE_EVICTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("recast_store_evictions_total", "Total expired entries evicted"),
        &["path"], // "timer", "sweep"
    )
    .unwrap()
});

// =============================================================================
// Pipeline
// =============================================================================

/// Pipeline requests by result.
pub static PIPELINE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("recast_pipeline_requests_total", "Total processing requests"),
        &["result"], // "success", or the failing stage
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(DOWNLOAD_ATTEMPTS.clone()),
        Box::new(DOWNLOADED_BYTES.clone()),
        Box::new(TRANSFORMS_TOTAL.clone()),
        Box::new(TRANSFORM_DURATION.clone()),
        Box::new(STORE_EVICTIONS.clone()),
        Box::new(PIPELINE_REQUESTS.clone()),
    ]
}
