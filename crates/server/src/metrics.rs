//! Prometheus metrics for observability.
//!
//! HTTP request metrics live here; pipeline, download and store counters are
//! defined in `recast_core::metrics` and registered alongside. Gauges for the
//! store and pools are refreshed at scrape time.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

static FILE_ID: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"^/api/files/.+$").unwrap());

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "recast_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("recast_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "recast_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Resource gauges (collected dynamically)
// =============================================================================

pub static STORE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("recast_store_entries", "Live entries in the ephemeral store").unwrap()
});

pub static STORE_BYTES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("recast_store_bytes", "Artifact bytes held by the ephemeral store").unwrap()
});

pub static WORKERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("recast_workers_active", "Jobs currently running on the worker pool").unwrap()
});

pub static WORKERS_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("recast_workers_queued", "Jobs waiting for a worker").unwrap()
});

pub static BUFFERS_FREE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("recast_buffers_free", "Idle buffers in the buffer pool").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        // Resources
        Box::new(STORE_ENTRIES.clone()),
        Box::new(STORE_BYTES.clone()),
        Box::new(WORKERS_ACTIVE.clone()),
        Box::new(WORKERS_QUEUED.clone()),
        Box::new(BUFFERS_FREE.clone()),
    ];

    // Core metrics (downloads, transforms, store, pipeline)
    for metric in collectors.into_iter().chain(recast_core::metrics::all_metrics()) {
        if let Err(e) = registry.register(metric) {
            warn!(error = %e, "Failed to register metric");
        }
    }
}

/// Forces registry initialisation so collectors exist before the first scrape.
pub fn init() {
    Lazy::force(&REGISTRY);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let pipeline = state.pipeline();

    let stats = pipeline.store().stats().await;
    STORE_ENTRIES.set(stats.entries as i64);
    STORE_BYTES.set(stats.total_bytes as i64);

    let workers = pipeline.workers().status();
    WORKERS_ACTIVE.set(workers.active_tasks as i64);
    WORKERS_QUEUED.set(workers.queued_tasks as i64);

    BUFFERS_FREE.set(state.buffers().stats().free as i64);
}

/// Normalize a path for metric labels. Everything under `/api/files/` is
/// client-chosen, so it collapses to a single placeholder.
pub fn normalize_path(path: &str) -> String {
    FILE_ID.replace(path, "/api/files/{id}").into_owned()
}
