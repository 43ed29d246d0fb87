//! Configuration management for gatekeep.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GatekeepError, Result};
use crate::ratelimit::{Purpose, RateLimiterConfig, MAX_STORE_SIZE};

/// Main configuration for gatekeep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeepConfig {
    /// Per-purpose limits
    #[serde(default)]
    pub limiters: LimitersConfig,

    /// Store bounds and housekeeping
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Limits for each limiter purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitersConfig {
    #[serde(default = "default_dashboard")]
    pub dashboard: LimitRule,

    #[serde(default = "default_public")]
    pub public: LimitRule,

    #[serde(default = "default_ai_generation")]
    pub ai_generation: LimitRule,

    #[serde(default = "default_review_submission")]
    pub review_submission: LimitRule,
}

impl Default for LimitersConfig {
    fn default() -> Self {
        Self {
            dashboard: default_dashboard(),
            public: default_public(),
            ai_generation: default_ai_generation(),
            review_submission: default_review_submission(),
        }
    }
}

impl LimitersConfig {
    /// The rule for `purpose`.
    pub fn rule(&self, purpose: Purpose) -> &LimitRule {
        match purpose {
            Purpose::Dashboard => &self.dashboard,
            Purpose::Public => &self.public,
            Purpose::AiGeneration => &self.ai_generation,
            Purpose::ReviewSubmission => &self.review_submission,
        }
    }
}

fn default_dashboard() -> LimitRule {
    LimitRule::new(60, 60)
}

fn default_public() -> LimitRule {
    LimitRule::new(30, 60)
}

fn default_ai_generation() -> LimitRule {
    LimitRule::new(10, 60)
}

fn default_review_submission() -> LimitRule {
    LimitRule::new(5, 60)
}

/// A limit as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    /// Requests allowed per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl LimitRule {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }

    /// Validate into a limiter configuration.
    pub fn to_limiter_config(&self) -> Result<RateLimiterConfig> {
        RateLimiterConfig::per_seconds(self.limit, self.window_secs)
    }
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum resident keys per limiter
    #[serde(default = "default_max_store_size")]
    pub max_store_size: usize,

    /// Passive sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_store_size: default_max_store_size(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl StoreConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_max_store_size() -> usize {
    MAX_STORE_SIZE
}

fn default_sweep_interval() -> u64 {
    60
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GatekeepConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatekeepConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GatekeepError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value a limiter would refuse to run with.
    pub fn validate(&self) -> Result<()> {
        for purpose in Purpose::ALL {
            self.limiters
                .rule(purpose)
                .to_limiter_config()
                .map_err(|e| GatekeepError::Config(format!("limiters.{}: {}", purpose, e)))?;
        }
        if self.store.max_store_size == 0 {
            return Err(GatekeepError::Config(
                "store.max_store_size must be positive".to_string(),
            ));
        }
        if self.store.sweep_interval_secs == 0 {
            return Err(GatekeepError::Config(
                "store.sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatekeepConfig::default();
        config.validate().unwrap();
        assert_eq!(config.store.max_store_size, 10_000);
        assert_eq!(config.store.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.limiters.rule(Purpose::ReviewSubmission).limit, 5);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
limiters:
  ai_generation:
    limit: 3
    window_secs: 120
store:
  max_store_size: 500
logging:
  format: json
"#;
        let config = GatekeepConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.limiters.ai_generation, LimitRule::new(3, 120));
        assert_eq!(config.limiters.public, default_public());
        assert_eq!(config.store.max_store_size, 500);
        assert_eq!(config.store.sweep_interval_secs, 60);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = GatekeepConfig::from_yaml("{}").unwrap();
        assert_eq!(config.limiters.dashboard, default_dashboard());
    }

    #[test]
    fn test_rejects_zero_limit() {
        let yaml = r#"
limiters:
  public:
    limit: 0
    window_secs: 60
"#;
        let err = GatekeepConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("limiters.public"));
    }

    #[test]
    fn test_rejects_zero_store_size() {
        let yaml = "store:\n  max_store_size: 0\n";
        assert!(matches!(
            GatekeepConfig::from_yaml(yaml),
            Err(GatekeepError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(GatekeepConfig::from_yaml("limiters: [").is_err());
    }

    #[test]
    fn test_from_missing_file() {
        let err = GatekeepConfig::from_file("/nonexistent/gatekeep.yaml").unwrap_err();
        assert!(matches!(err, GatekeepError::Io(_)));
    }
}
