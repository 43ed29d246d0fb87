//! Error types for gatekeep.

use thiserror::Error;

use crate::ratelimit::Purpose;

/// Main error type for gatekeep operations.
#[derive(Error, Debug)]
pub enum GatekeepError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request was refused by a rate limiter
    #[error("Too many {purpose} requests, retry after {retry_after}s")]
    RateLimited {
        /// Which limiter refused the request
        purpose: Purpose,
        /// Seconds until the caller's window resets
        retry_after: u64,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatekeepError {
    /// The `Retry-After` header value for a rate limit rejection.
    pub fn retry_after_header(&self) -> Option<String> {
        match self {
            GatekeepError::RateLimited { retry_after, .. } => Some(retry_after.to_string()),
            _ => None,
        }
    }
}

/// Result type alias for gatekeep operations.
pub type Result<T> = std::result::Result<T, GatekeepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_message() {
        let err = GatekeepError::RateLimited {
            purpose: Purpose::AiGeneration,
            retry_after: 42,
        };
        assert_eq!(
            err.to_string(),
            "Too many ai-generation requests, retry after 42s"
        );
        assert_eq!(err.retry_after_header().as_deref(), Some("42"));
    }

    #[test]
    fn test_retry_after_header_only_for_rejections() {
        let err = GatekeepError::Config("bad".to_string());
        assert_eq!(err.retry_after_header(), None);
    }
}
