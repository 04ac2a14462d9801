//! HTTP downloader with retry and validation.

use reqwest::{Client, StatusCode, Url};
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::config::DownloaderConfig;
use super::error::DownloadError;
use crate::media::MediaFormat;
use crate::metrics;
use crate::pool::{BufferHandle, BufferPool};

const LOG_URL_MAX: usize = 60;

/// Fetches remote media into memory.
pub struct Downloader {
    config: DownloaderConfig,
    client: Client,
    buffers: Arc<BufferPool>,
}

impl Downloader {
    /// Creates a downloader reading into buffers from `buffers`.
    pub fn new(config: DownloaderConfig, buffers: Arc<BufferPool>) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;

        Ok(Self {
            config,
            client,
            buffers,
        })
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Parses `url` and checks its scheme. No network I/O.
    pub fn validate_url(&self, url: &str) -> Result<Url, DownloadError> {
        let parsed = Url::parse(url).map_err(|e| DownloadError::invalid_url(e.to_string()))?;
        let scheme = parsed.scheme();
        if !self
            .config
            .allowed_schemes
            .iter()
            .any(|s| s.eq_ignore_ascii_case(scheme))
        {
            return Err(DownloadError::InvalidScheme {
                scheme: scheme.to_string(),
            });
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(DownloadError::invalid_url("missing host"));
        }
        Ok(parsed)
    }

    /// Downloads `url`, retrying transient failures, then validates the bytes.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let url = self.validate_url(url)?;
        let max_attempts = self.config.max_attempts.max(1);
        let started = Instant::now();

        let mut attempt = 0;
        let data = loop {
            attempt += 1;
            debug!(url = %truncate_url(url.as_str()), attempt, "Download attempt");

            match self.fetch_once(&url).await {
                Ok(data) => {
                    metrics::DOWNLOAD_ATTEMPTS
                        .with_label_values(&["success"])
                        .inc();
                    break data;
                }
                Err(e) => {
                    metrics::DOWNLOAD_ATTEMPTS
                        .with_label_values(&[e.label()])
                        .inc();

                    if !e.is_transient() {
                        warn!(url = %truncate_url(url.as_str()), attempt, error = %e, "Download failed");
                        return Err(e);
                    }
                    if attempt >= max_attempts {
                        warn!(
                            url = %truncate_url(url.as_str()),
                            attempts = attempt,
                            error = %e,
                            "Download failed, retries exhausted"
                        );
                        return Err(DownloadError::ExhaustedRetries {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }

                    let delay = self.config.backoff(attempt);
                    warn!(
                        url = %truncate_url(url.as_str()),
                        attempt,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Transient download failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        self.validate(&url, &data)?;
        metrics::DOWNLOADED_BYTES.inc_by(data.len() as u64);

        info!(
            url = %truncate_url(url.as_str()),
            bytes = data.len(),
            attempts = attempt,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Download complete"
        );
        Ok(data)
    }

    async fn fetch_once(&self, url: &Url) -> Result<Vec<u8>, DownloadError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let max = self.config.max_size_bytes;
        match response.content_length() {
            Some(declared) => {
                if declared > max {
                    return Err(DownloadError::Oversize {
                        size: declared,
                        max,
                    });
                }

                let mut buf = self.buffers.acquire(declared as usize);
                while (buf.len() as u64) < declared {
                    let chunk = match response.chunk().await {
                        Ok(Some(chunk)) => chunk,
                        Ok(None) => break,
                        Err(e) if e.is_timeout() => return Err(DownloadError::Timeout),
                        Err(e) => {
                            debug!(error = %e, "Body read failed");
                            break;
                        }
                    };
                    let remaining = (declared - buf.len() as u64) as usize;
                    buf.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
                }

                let received = buf.len() as u64;
                if received < declared {
                    self.buffers.release(buf);
                    return Err(DownloadError::IncompleteTransfer {
                        expected: declared,
                        received,
                    });
                }
                Ok(self.take_bytes(buf))
            }
            None => {
                let mut buf = self.buffers.acquire(0);
                while let Some(chunk) = response.chunk().await.map_err(classify)? {
                    let size = buf.len() as u64 + chunk.len() as u64;
                    if size > max {
                        self.buffers.release(buf);
                        return Err(DownloadError::Oversize { size, max });
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(self.take_bytes(buf))
            }
        }
    }

    /// Copies the payload out of a pooled buffer and returns the buffer, or
    /// detaches a buffer that grew too large to be pooled.
    fn take_bytes(&self, buf: BufferHandle) -> Vec<u8> {
        if buf.capacity() > self.buffers.buffer_size().saturating_mul(2) {
            return buf.into_vec();
        }
        let data = buf.to_vec();
        self.buffers.release(buf);
        data
    }

    fn validate(&self, url: &Url, data: &[u8]) -> Result<(), DownloadError> {
        if data.is_empty() {
            return Err(DownloadError::validation("downloaded file is empty"));
        }
        if (data.len() as u64) < self.config.min_size_bytes {
            return Err(DownloadError::validation(format!(
                "file too small: {} bytes (minimum {})",
                data.len(),
                self.config.min_size_bytes
            )));
        }
        if let Some(format) = MediaFormat::from_url(url) {
            format
                .validate_signature(data)
                .map_err(DownloadError::validation)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("config", &self.config)
            .finish()
    }
}

/// Maps a reqwest failure onto the downloader taxonomy.
fn classify(err: reqwest::Error) -> DownloadError {
    if err.is_timeout() {
        return DownloadError::Timeout;
    }
    if err.is_connect() || err.is_body() || err.is_request() || has_transient_io_cause(&err) {
        return DownloadError::Network(err.to_string());
    }
    DownloadError::Request(err.to_string())
}

fn has_transient_io_cause(err: &reqwest::Error) -> bool {
    use std::io::ErrorKind;

    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::BrokenPipe
                    | ErrorKind::TimedOut
            );
        }
        source = cause.source();
    }
    false
}

/// Shortens a URL for log lines.
pub fn truncate_url(url: &str) -> String {
    if url.chars().count() <= LOG_URL_MAX {
        return url.to_string();
    }
    let head: String = url.chars().take(LOG_URL_MAX - 3).collect();
    format!("{}...", head)
}
