use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use recast_core::pool::BufferPoolStats;
use recast_core::{Config, PoolStatus, StoreStats};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Transform engine version, or `unavailable` when the version check fails.
    pub engine: String,
    pub store: StoreStats,
    pub workers: PoolStatus,
    pub buffers: BufferPoolStats,
    pub processed: u64,
    pub failed: u64,
}

#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pipeline = state.pipeline();
    let engine = pipeline
        .transformer()
        .version()
        .await
        .unwrap_or_else(|| "unavailable".to_string());
    let status = pipeline.status();

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        engine,
        store: pipeline.store().stats().await,
        workers: status.workers,
        buffers: state.buffers().stats(),
        processed: status.processed,
        failed: status.failed,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "recast",
        version: VERSION,
        endpoints: vec![
            "POST /api/process",
            "GET /api/files/{id}",
            "GET /api/health",
            "GET /api/config",
            "GET /metrics",
        ],
    })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
