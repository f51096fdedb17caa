use crate::client::providers::{FetchError, FetchErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Crate-level error for everything outside a single adapter call
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (permanent failures)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // I/O errors (potentially transient)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors (usually permanent)
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // Network errors (transient - should retry)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Client errors (permanent - don't retry)
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Timeout error: operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // Source adapter errors, classified by kind
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unknown source adapter: {0}")]
    UnknownAdapter(String),
}

/// Error categorization for retry strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited - retry with backoff
    RateLimited,
}

impl Error {
    /// Categorize error for retry logic
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_)
            | Self::InvalidInput { .. }
            | Self::Serde(_)
            | Self::Toml(_)
            | Self::UnknownAdapter(_) => ErrorCategory::Permanent,

            Self::Http(_) | Self::Timeout { .. } | Self::Io(_) => ErrorCategory::Transient,

            Self::Fetch(FetchError::RateLimit) => ErrorCategory::RateLimited,
            Self::Fetch(error) => match error.kind() {
                FetchErrorKind::Transport => ErrorCategory::Transient,
                FetchErrorKind::NotFound
                | FetchErrorKind::Parse
                | FetchErrorKind::IdentifierInvalid => ErrorCategory::Permanent,
            },
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Get suggested retry delay for rate limited errors
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Fetch(FetchError::RateLimit) => Some(Duration::from_secs(60)),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput {
            field: "doi".to_string(),
            reason: "DOI cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid input: doi - DOI cannot be empty");
    }

    #[test]
    fn test_fetch_errors_are_categorized_by_kind() {
        let transport = Error::from(FetchError::Network("connection reset".to_string()));
        assert_eq!(transport.category(), ErrorCategory::Transient);
        assert!(transport.is_retryable());

        let parse = Error::from(FetchError::Parse("bad xml".to_string()));
        assert_eq!(parse.category(), ErrorCategory::Permanent);
        assert!(!parse.is_retryable());

        let rate_limited = Error::from(FetchError::RateLimit);
        assert_eq!(rate_limited.category(), ErrorCategory::RateLimited);
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));
    }
}
