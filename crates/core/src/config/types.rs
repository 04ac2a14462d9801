use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::download::DownloaderConfig;
use crate::pool::PoolConfig;
use crate::processor::ProcessorConfig;
use crate::store::StoreConfig;
use crate::transform::TransformerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StoreConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub transformer: TransformerConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used to build download links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            enable_cors: default_enable_cors(),
        }
    }
}

impl ServerConfig {
    /// Download URL for a stored artifact.
    pub fn download_url(&self, id: &str, extension: &str) -> String {
        format!(
            "{}/api/files/{}.{}",
            self.base_url.trim_end_matches('/'),
            id,
            extension
        )
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    4000
}

fn default_base_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_enable_cors() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert!(config.server.enable_cors);
        assert_eq!(config.storage.ttl_secs, 600);
        assert_eq!(config.pool.workers, 4);
        assert_eq!(config.downloader.max_attempts, 3);
        assert_eq!(config.processor.request_timeout_secs, 300);
    }

    #[test]
    fn test_download_url() {
        let server = ServerConfig {
            base_url: "https://media.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            server.download_url("abc123", "mp4"),
            "https://media.example.com/api/files/abc123.mp4"
        );
    }
}
