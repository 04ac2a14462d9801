//! Error types for the downloader module.

use thiserror::Error;

/// Errors that can occur while fetching a remote resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL could not be parsed.
    #[error("Invalid URL: {reason}")]
    InvalidUrl { reason: String },

    /// The URL scheme is not allowed.
    #[error("Unsupported URL scheme: {scheme}")]
    InvalidScheme { scheme: String },

    /// The payload exceeds the configured ceiling.
    #[error("File too large: {size} bytes exceeds limit of {max} bytes")]
    Oversize { size: u64, max: u64 },

    /// Fewer bytes arrived than the server declared.
    #[error("Incomplete transfer: received {received} of {expected} bytes")]
    IncompleteTransfer { expected: u64, received: u64 },

    /// The server answered with a non-200 status.
    #[error("HTTP error: status {status}")]
    HttpStatus { status: u16 },

    /// The bytes failed the size or signature sanity checks.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// The request timed out.
    #[error("Download timed out")]
    Timeout,

    /// Connection-level failure (reset, refused, unexpected EOF).
    #[error("Network error: {0}")]
    Network(String),

    /// Any other request failure.
    #[error("Request failed: {0}")]
    Request(String),

    /// All attempts failed with transient errors.
    #[error("Download failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: Box<DownloadError>,
    },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl DownloadError {
    pub fn invalid_url(reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Network(_) | Self::IncompleteTransfer { .. }
        )
    }

    /// Whether the failure is caused by the request itself (bad URL, bad
    /// payload) rather than by the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Client(_))
    }

    /// The innermost error, looking through `ExhaustedRetries`.
    pub fn root(&self) -> &DownloadError {
        match self {
            Self::ExhaustedRetries { last, .. } => last.root(),
            other => other,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidScheme { .. } => "invalid_url",
            Self::Oversize { .. } => "oversize",
            Self::IncompleteTransfer { .. } => "incomplete",
            Self::HttpStatus { .. } => "http_status",
            Self::Validation { .. } => "validation",
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Request(_) => "request",
            Self::ExhaustedRetries { .. } => "exhausted",
            Self::Client(_) => "client",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DownloadError::Timeout.is_transient());
        assert!(DownloadError::Network("reset".into()).is_transient());
        assert!(DownloadError::IncompleteTransfer {
            expected: 10,
            received: 5
        }
        .is_transient());

        assert!(!DownloadError::HttpStatus { status: 404 }.is_transient());
        assert!(!DownloadError::Oversize { size: 2, max: 1 }.is_transient());
        assert!(!DownloadError::InvalidScheme {
            scheme: "ftp".into()
        }
        .is_transient());
        assert!(!DownloadError::validation("bad").is_transient());
    }

    #[test]
    fn test_root_unwraps_exhausted() {
        let err = DownloadError::ExhaustedRetries {
            attempts: 3,
            last: Box::new(DownloadError::Timeout),
        };
        assert!(matches!(err.root(), DownloadError::Timeout));
        assert!(err.to_string().contains("3 attempts"));
    }
}
