//! Resilient remote fetch.
//!
//! [`Downloader`] pulls a remote media file into memory with a hard size
//! ceiling, retries transient failures with linear backoff and runs a
//! shallow structural check on the result before handing it back.

mod config;
mod downloader;
mod error;

pub use config::DownloaderConfig;
pub use downloader::{truncate_url, Downloader};
pub use error::DownloadError;
