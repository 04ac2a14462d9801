//! API tests running the full router in-process.

mod common;

use std::time::Duration;

use axum::http::{header, StatusCode};
use recast_core::{MediaFormat, TransformError};
use serde_json::json;

use common::{fixtures, Reply, TestConfig, TestFixture};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["engine"], "mock 1.0");
    assert_eq!(response.body["store"]["entries"], 0);
    assert_eq!(response.body["workers"]["state"], "running");
    assert_eq!(response.body["workers"]["workers"], 2);
    assert!(response.body["buffers"]["buffer_size"].is_number());
}

#[tokio::test]
async fn test_config_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["server"]["base_url"], "http://files.test");
    assert_eq!(response.body["pool"]["workers"], 2);
    assert_eq!(response.body["downloader"]["max_attempts"], 2);
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["service"], "recast");
    let endpoints = response.body["endpoints"].as_array().unwrap();
    assert!(endpoints.iter().any(|e| e == "POST /api/process"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/health").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);

    let text = String::from_utf8(response.bytes).unwrap();
    assert!(text.contains("recast_http_requests_total"));
    assert!(text.contains("recast_store_entries"));
    assert!(text.contains("recast_workers_active"));
}

// =============================================================================
// Processing
// =============================================================================

#[tokio::test]
async fn test_process_and_download() {
    let fixture = TestFixture::new().await;
    let original = fixtures::media_bytes(MediaFormat::Mp3, 4096);
    let url = fixture.host("/music/track.mp3", original.clone());

    let response = fixture.post("/api/process", json!({ "url": url })).await;

    assert_eq!(response.status, StatusCode::OK, "body: {}", response.body);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["media_type"], "audio");
    assert_eq!(response.body["format"], "mp3");
    assert!(response.body["expires_at"].is_string());

    let file_id = response.body["file_id"].as_str().unwrap().to_string();
    let download_url = response.body["download_url"].as_str().unwrap();
    assert_eq!(
        download_url,
        format!("http://files.test/api/files/{}.mp3", file_id)
    );

    let download = fixture.get(&format!("/api/files/{}.mp3", file_id)).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.headers[header::CONTENT_TYPE], "audio/mpeg");
    let disposition = download.headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap();
    assert!(disposition.starts_with("attachment;"));
    assert!(download.bytes.starts_with(&original));
    assert_ne!(download.bytes, original);

    // Downloadable repeatedly until expiry, with or without the extension.
    let again = fixture.get(&format!("/api/files/{}", file_id)).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.bytes, download.bytes);
}

#[tokio::test]
async fn test_video_is_served_as_mp4() {
    let fixture = TestFixture::new().await;
    let url = fixture.host("/clip.mov", fixtures::media_bytes(MediaFormat::Mov, 2048));

    let response = fixture.post("/api/process", json!({ "url": url })).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["media_type"], "video");
    assert_eq!(response.body["format"], "mp4");
    assert!(response.body["download_url"]
        .as_str()
        .unwrap()
        .ends_with(".mp4"));
}

#[tokio::test]
async fn test_process_rejects_malformed_body() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_raw("/api/process", "{not json").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);

    let response = fixture.post("/api/process", json!({ "url": "  " })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "url is required");
}

#[tokio::test]
async fn test_process_rejects_unsupported_media() {
    let fixture = TestFixture::new().await;
    let url = fixture.host("/notes.pdf", vec![b'%'; 512]);

    let response = fixture.post("/api/process", json!({ "url": url })).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert!(response.body["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported media type"));
    assert!(response.body.get("file_id").is_none());
    assert_eq!(fixture.origin.hits("/notes.pdf"), 0);
}

#[tokio::test]
async fn test_process_rejects_bad_scheme() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/process", json!({ "url": "ftp://example.com/a.mp3" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_upstream_error_is_bad_request() {
    let fixture = TestFixture::new().await;
    fixture.origin.route("/missing.png", vec![Reply::Status(404)]);

    let response = fixture
        .post(
            "/api/process",
            json!({ "url": fixture.origin.url("/missing.png") }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["message"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn test_transform_failure_is_server_error() {
    let fixture = TestFixture::new().await;
    let url = fixture.host("/pic.webp", fixtures::media_bytes(MediaFormat::Webp, 1024));
    fixture
        .transformer
        .set_next_error(TransformError::engine_failed(Some(1), "corrupt stream"))
        .await;

    let response = fixture.post("/api/process", json!({ "url": url })).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["message"]
        .as_str()
        .unwrap()
        .contains("corrupt stream"));
    assert!(fixture.store.is_empty().await);
}

#[tokio::test]
async fn test_request_timeout_is_gateway_timeout() {
    let fixture = TestFixture::with_config(TestConfig {
        request_timeout_secs: 1,
        ..Default::default()
    })
    .await;
    let url = fixture.host("/long.mp4", fixtures::media_bytes(MediaFormat::Mp4, 1024));
    fixture.transformer.set_duration(Duration::from_secs(3)).await;

    let response = fixture.post("/api/process", json!({ "url": url })).await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_stopped_workers_are_unavailable() {
    let fixture = TestFixture::new().await;
    let url = fixture.host("/a.png", fixtures::media_bytes(MediaFormat::Png, 1024));
    fixture.workers.stop().await;

    let response = fixture.post("/api/process", json!({ "url": url })).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Downloads
// =============================================================================

#[tokio::test]
async fn test_unknown_file_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .get("/api/files/0123456789abcdef0123456789abcdef.mp3")
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_file_is_not_found() {
    let fixture = TestFixture::with_config(TestConfig {
        ttl: Duration::from_millis(300),
        ..Default::default()
    })
    .await;
    let url = fixture.host("/x.jpg", fixtures::media_bytes(MediaFormat::Jpeg, 1024));

    let response = fixture.post("/api/process", json!({ "url": url })).await;
    assert_eq!(response.status, StatusCode::OK);
    let file_id = response.body["file_id"].as_str().unwrap().to_string();

    let response = fixture.get(&format!("/api/files/{}.jpg", file_id)).await;
    assert_eq!(response.status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let response = fixture.get(&format!("/api/files/{}.jpg", file_id)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
