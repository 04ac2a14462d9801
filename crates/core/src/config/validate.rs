use super::{types::Config, ConfigError};

/// Longest accepted object lifetime (7 days).
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0 and base URL is http(s)
/// - Storage TTL is between 1s and 7 days and longer than the sweep interval
/// - Pool and downloader limits are non-zero and consistent
/// - Download, transform and request timeouts are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    // Server
    if config.server.port == 0 {
        return fail("server.port cannot be 0");
    }
    if !(config.server.base_url.starts_with("http://")
        || config.server.base_url.starts_with("https://"))
    {
        return fail("server.base_url must start with http:// or https://");
    }

    // Storage
    if config.storage.ttl_secs == 0 {
        return fail("storage.ttl_secs cannot be 0");
    }
    if config.storage.ttl_secs > MAX_TTL_SECS {
        return fail("storage.ttl_secs cannot exceed 7 days");
    }
    if let Some(interval) = config.storage.sweep_interval_secs {
        if interval == 0 || interval >= config.storage.ttl_secs {
            return fail("storage.sweep_interval_secs must be between 1 and ttl_secs");
        }
    }

    // Pool
    if config.pool.workers == 0 {
        return fail("pool.workers cannot be 0");
    }
    if config.pool.queue_capacity == 0 {
        return fail("pool.queue_capacity cannot be 0");
    }
    if config.pool.buffer_size_bytes == 0 {
        return fail("pool.buffer_size_bytes cannot be 0");
    }

    // Downloader
    if config.downloader.min_size_bytes > config.downloader.max_size_bytes {
        return fail("downloader.min_size_bytes cannot exceed max_size_bytes");
    }
    if config.downloader.max_attempts == 0 {
        return fail("downloader.max_attempts cannot be 0");
    }
    if config.downloader.allowed_schemes.is_empty() {
        return fail("downloader.allowed_schemes cannot be empty");
    }
    if config.downloader.timeout_secs == 0 {
        return fail("downloader.timeout_secs cannot be 0");
    }

    // Transformer
    if config.transformer.timeout_secs == 0 {
        return fail("transformer.timeout_secs cannot be 0");
    }

    // Processor
    if config.processor.request_timeout_secs == 0 {
        return fail("processor.request_timeout_secs cannot be 0");
    }

    Ok(())
}
