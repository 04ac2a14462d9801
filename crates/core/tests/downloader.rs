//! Downloader behaviour against a scripted origin.

use std::sync::Arc;
use std::time::{Duration, Instant};

use recast_core::testing::{fixtures, MediaServer, Reply};
use recast_core::{BufferPool, DownloadError, Downloader, DownloaderConfig, MediaFormat};
use tokio_test::{assert_err, assert_ok};

const MAX: u64 = 4096;

fn downloader(buffers: Arc<BufferPool>) -> Downloader {
    let config = DownloaderConfig::default()
        .with_size_limits(100, MAX)
        .with_retry(3, 20)
        .with_timeout(5);
    assert_ok!(Downloader::new(config, buffers))
}

fn mp3(len: usize) -> Vec<u8> {
    fixtures::media_bytes(MediaFormat::Mp3, len)
}

#[tokio::test]
async fn test_download_success() {
    let server = MediaServer::start().await.unwrap();
    let body = mp3(1500);
    server.route("/song.mp3", vec![Reply::Body(body.clone())]);

    let d = downloader(Arc::new(BufferPool::new(2, 1024)));
    let data = assert_ok!(d.download(&server.url("/song.mp3")).await);

    assert_eq!(data, body);
    assert_eq!(server.hits("/song.mp3"), 1);
}

#[tokio::test]
async fn test_truncated_body_retries_then_fails() {
    let server = MediaServer::start().await.unwrap();
    let body = mp3(2000);
    server.route(
        "/cut.mp3",
        vec![Reply::Truncated {
            declared: body.len(),
            body: body[..700].to_vec(),
        }],
    );

    let d = downloader(Arc::new(BufferPool::new(2, 1024)));
    let started = Instant::now();
    let err = assert_err!(d.download(&server.url("/cut.mp3")).await);

    assert_eq!(server.hits("/cut.mp3"), 3);
    match err {
        DownloadError::ExhaustedRetries { attempts, ref last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(
                **last,
                DownloadError::IncompleteTransfer {
                    expected: 2000,
                    received: 700
                }
            ));
        }
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
    // 1x then 2x the base delay
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_dropped_connection_recovers_on_retry() {
    let server = MediaServer::start().await.unwrap();
    let body = mp3(800);
    server.route("/flaky.mp3", vec![Reply::Drop, Reply::Body(body.clone())]);

    let d = downloader(Arc::new(BufferPool::new(2, 1024)));
    let data = assert_ok!(d.download(&server.url("/flaky.mp3")).await);

    assert_eq!(data, body);
    assert_eq!(server.hits("/flaky.mp3"), 2);
}

#[tokio::test]
async fn test_http_status_is_not_retried() {
    let server = MediaServer::start().await.unwrap();
    server.route("/gone.mp3", vec![Reply::Status(404)]);

    let d = downloader(Arc::new(BufferPool::new(2, 1024)));
    let err = assert_err!(d.download(&server.url("/gone.mp3")).await);

    assert!(matches!(err, DownloadError::HttpStatus { status: 404 }));
    assert_eq!(server.hits("/gone.mp3"), 1);
}

#[tokio::test]
async fn test_exactly_max_size_is_accepted() {
    let server = MediaServer::start().await.unwrap();
    let body = mp3(MAX as usize);
    server.route("/sized.mp3", vec![Reply::Body(body.clone())]);
    server.route("/unsized.mp3", vec![Reply::Unsized(body.clone())]);

    let d = downloader(Arc::new(BufferPool::new(2, 1024)));
    assert_eq!(d.download(&server.url("/sized.mp3")).await.unwrap(), body);
    assert_eq!(d.download(&server.url("/unsized.mp3")).await.unwrap(), body);
}

#[tokio::test]
async fn test_one_byte_over_max_is_rejected() {
    let server = MediaServer::start().await.unwrap();
    let body = mp3(MAX as usize + 1);
    server.route("/sized.mp3", vec![Reply::Body(body.clone())]);
    server.route("/unsized.mp3", vec![Reply::Unsized(body)]);

    let d = downloader(Arc::new(BufferPool::new(2, 1024)));

    let err = d.download(&server.url("/sized.mp3")).await.unwrap_err();
    assert!(matches!(err, DownloadError::Oversize { size, max } if size == MAX + 1 && max == MAX));

    let err = d.download(&server.url("/unsized.mp3")).await.unwrap_err();
    assert!(matches!(err, DownloadError::Oversize { .. }));

    // Structural errors are never retried.
    assert_eq!(server.hits("/sized.mp3"), 1);
    assert_eq!(server.hits("/unsized.mp3"), 1);
}

#[tokio::test]
async fn test_signature_mismatch_is_validation_error() {
    let server = MediaServer::start().await.unwrap();
    server.route("/fake.png", vec![Reply::Body(vec![b'x'; 500])]);

    let d = downloader(Arc::new(BufferPool::new(2, 1024)));
    let err = d.download(&server.url("/fake.png")).await.unwrap_err();

    assert!(matches!(err, DownloadError::Validation { .. }));
    assert!(err.to_string().contains("png"));
}

#[tokio::test]
async fn test_too_small_payload_is_rejected() {
    let server = MediaServer::start().await.unwrap();
    server.route("/tiny.mp3", vec![Reply::Body(mp3(40))]);

    let d = downloader(Arc::new(BufferPool::new(2, 1024)));
    let err = d.download(&server.url("/tiny.mp3")).await.unwrap_err();

    assert!(err.to_string().contains("too small"));
}

#[tokio::test]
async fn test_buffers_are_returned_to_pool() {
    let server = MediaServer::start().await.unwrap();
    server.route("/a.mp3", vec![Reply::Body(mp3(900))]);
    server.route(
        "/b.mp3",
        vec![Reply::Truncated {
            declared: 900,
            body: mp3(100),
        }],
    );

    let buffers = Arc::new(BufferPool::new(2, 1024));
    let d = downloader(Arc::clone(&buffers));

    for _ in 0..5 {
        d.download(&server.url("/a.mp3")).await.unwrap();
    }
    let _ = d.download(&server.url("/b.mp3")).await;

    let stats = buffers.stats();
    assert!(stats.free >= 1);
    assert!(stats.reused >= 4, "buffers should be reused: {stats:?}");
}
