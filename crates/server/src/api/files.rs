//! Processing and artifact download handlers.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use recast_core::{MediaFormat, MediaKind, PipelineError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for processing a remote file
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    /// Remote media URL
    pub url: String,
}

/// Response for process requests. Failures only carry `success` and `message`.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<MediaFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProcessResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            download_url: None,
            file_id: None,
            media_type: None,
            format: None,
            expires_at: None,
        }
    }
}

/// HTTP status for a failed pipeline run.
pub fn status_for(error: &PipelineError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if error.is_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else if matches!(error, PipelineError::Timeout { .. }) {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Download, transform and store a remote file
pub async fn process(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ProcessRequest>, JsonRejection>,
) -> (StatusCode, Json<ProcessResponse>) {
    let Ok(Json(request)) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ProcessResponse::failure("Invalid request body")),
        );
    };

    let url = request.url.trim();
    if url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ProcessResponse::failure("url is required")),
        );
    }

    match state.pipeline().process(url).await {
        Ok(outcome) => {
            let download_url = state
                .config()
                .server
                .download_url(&outcome.id, outcome.format.extension());
            (
                StatusCode::OK,
                Json(ProcessResponse {
                    success: true,
                    message: "File processed successfully".to_string(),
                    download_url: Some(download_url),
                    file_id: Some(outcome.id),
                    media_type: Some(outcome.media_kind),
                    format: Some(outcome.format),
                    expires_at: Some(outcome.expires_at),
                }),
            )
        }
        Err(e) => (status_for(&e), Json(ProcessResponse::failure(e.to_string()))),
    }
}

/// Serve a stored artifact until it expires
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    // "abc123.mp3" -> "abc123"
    let file_id = match id.rfind('.') {
        Some(idx) if idx > 0 => &id[..idx],
        _ => id.as_str(),
    };

    let Some(object) = state.pipeline().store().get(file_id).await else {
        debug!(id = %file_id, "File not found or expired");
        return (StatusCode::NOT_FOUND, "File not found or expired").into_response();
    };

    let file_name = object
        .artifact_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.{}", object.id, object.format.extension()));

    let mut response = match ServeFile::new(&object.artifact_path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };
    if !response.status().is_success() {
        return (StatusCode::NOT_FOUND, "File not found on disk").into_response();
    }

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(object.format.content_type()),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
