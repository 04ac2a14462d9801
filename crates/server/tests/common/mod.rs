//! Common test utilities for in-process API testing.
//!
//! Builds the full router around a mock transformer, a temporary store
//! directory and a scripted media origin, so requests can be driven through
//! `tower::ServiceExt::oneshot` without ffmpeg or network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use recast_core::testing::{MediaServer, MockTransformer};
use recast_core::{
    BufferPool, Config, Downloader, EphemeralStore, ProcessingPipeline, WorkerPool,
};
use recast_server::state::AppState;

/// Re-export fixtures for test convenience
pub use recast_core::testing::{fixtures, Reply};

/// Test fixture for API testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock transformer - control failures and delays
    pub transformer: Arc<MockTransformer>,
    /// Scripted origin serving the media to process
    pub origin: MediaServer,
    pub store: Arc<EphemeralStore>,
    pub workers: Arc<WorkerPool>,
    pub config: Config,
    /// Temporary directory holding the store
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub ttl: Duration,
    pub request_timeout_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            request_timeout_secs: 30,
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.server.base_url = "http://files.test".to_string();
        config.storage.dir = temp_dir.path().join("store");
        config.pool.workers = 2;
        config.pool.buffer_size_bytes = 64 * 1024;
        config.downloader = config.downloader.with_retry(2, 10).with_timeout(5);
        config.processor = config
            .processor
            .with_request_timeout(test_config.request_timeout_secs);

        let store = Arc::new(
            EphemeralStore::open_with_timing(
                &config.storage.dir,
                test_config.ttl,
                test_config.ttl / 4,
            )
            .await
            .expect("Failed to open store"),
        );
        let workers = Arc::new(WorkerPool::from_config(&config.pool));
        workers.start().expect("Failed to start workers");

        let buffers = Arc::new(BufferPool::new(
            config.pool.buffer_count,
            config.pool.buffer_size_bytes,
        ));
        let downloader = Arc::new(
            Downloader::new(config.downloader.clone(), Arc::clone(&buffers))
                .expect("Failed to create downloader"),
        );
        let transformer = Arc::new(MockTransformer::new());

        let pipeline = Arc::new(ProcessingPipeline::new(
            config.processor.clone(),
            downloader,
            transformer.clone(),
            Arc::clone(&store),
            Arc::clone(&workers),
        ));

        let state = Arc::new(AppState::new(config.clone(), pipeline, buffers));
        let router = recast_server::api::create_router(state);

        Self {
            router,
            transformer,
            origin: MediaServer::start().await.expect("Failed to start origin"),
            store,
            workers,
            config,
            temp_dir,
        }
    }

    /// Serves `body` at `path` on the origin and returns its URL.
    pub fn host(&self, path: &str, body: Vec<u8>) -> String {
        self.origin.route(path, vec![Reply::Body(body)]);
        self.origin.url(path)
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}
