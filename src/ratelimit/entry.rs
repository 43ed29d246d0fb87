//! Per-key window state and limiter configuration.

use std::time::Duration;

use crate::error::{GatekeepError, Result};

/// Configuration for a single rate limiter instance.
///
/// Both fields are validated on construction; a limiter never sees a zero
/// limit or an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    limit: u32,
    window: Duration,
}

impl RateLimiterConfig {
    /// Create a configuration allowing `limit` requests per `window`.
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(GatekeepError::Config(
                "rate limit must allow at least one request".to_string(),
            ));
        }
        if window.as_millis() == 0 {
            return Err(GatekeepError::Config(
                "rate limit window must be at least one millisecond".to_string(),
            ));
        }
        Ok(Self { limit, window })
    }

    /// Shorthand for a window expressed in whole seconds.
    pub fn per_seconds(limit: u32, window_secs: u64) -> Result<Self> {
        Self::new(limit, Duration::from_secs(window_secs))
    }

    /// Maximum requests allowed per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in milliseconds.
    pub fn window_millis(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

/// Counter state for one key within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests counted in the current window
    pub count: u32,
    /// Epoch milliseconds at which the window ends
    pub reset_at: u64,
}

impl RateLimitEntry {
    /// Open a fresh window at `now` with the first request already counted.
    pub fn new(now: u64, window_millis: u64) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(window_millis),
        }
    }

    /// Whether the window has ended.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.reset_at
    }

    /// Whole seconds until the window ends, rounded up.
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        self.reset_at.saturating_sub(now).div_ceil(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_zero_limit() {
        let err = RateLimiterConfig::per_seconds(0, 60).unwrap_err();
        assert!(matches!(err, GatekeepError::Config(_)));
    }

    #[test]
    fn test_config_rejects_zero_window() {
        assert!(RateLimiterConfig::new(5, Duration::ZERO).is_err());
        assert!(RateLimiterConfig::new(5, Duration::from_micros(500)).is_err());
    }

    #[test]
    fn test_config_window_millis() {
        let config = RateLimiterConfig::per_seconds(3, 60).unwrap();
        assert_eq!(config.limit(), 3);
        assert_eq!(config.window_millis(), 60_000);
    }

    #[test]
    fn test_entry_starts_at_one() {
        let entry = RateLimitEntry::new(5_000, 1_000);
        assert_eq!(entry.count, 1);
        assert_eq!(entry.reset_at, 6_000);
    }

    #[test]
    fn test_entry_expires_at_reset() {
        let entry = RateLimitEntry::new(0, 1_000);
        assert!(!entry.is_expired(999));
        assert!(entry.is_expired(1_000));
        assert!(entry.is_expired(1_001));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let entry = RateLimitEntry::new(0, 60_000);
        assert_eq!(entry.retry_after_secs(0), 60);
        assert_eq!(entry.retry_after_secs(59_001), 1);
        assert_eq!(entry.retry_after_secs(58_999), 2);
        assert_eq!(entry.retry_after_secs(60_000), 0);
        assert_eq!(entry.retry_after_secs(70_000), 0);
    }
}
