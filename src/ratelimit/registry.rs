//! One limiter per purpose, built once at startup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::key::{ClientIdentity, Purpose, RateLimitKey};
use super::limiter::{Decision, RateLimiter};
use super::sweeper::SweeperHandle;
use crate::config::{LimitersConfig, StoreConfig};
use crate::error::{GatekeepError, Result};

/// The set of independent limiters a service hands to its request handlers.
///
/// Each purpose owns its own store, so keys and quotas never bleed between
/// concerns.
#[derive(Debug, Clone)]
pub struct Limiters {
    dashboard: Arc<RateLimiter>,
    public: Arc<RateLimiter>,
    ai_generation: Arc<RateLimiter>,
    review_submission: Arc<RateLimiter>,
}

impl Limiters {
    /// Build limiters from configuration using the system clock.
    pub fn from_config(limits: &LimitersConfig, store: &StoreConfig) -> Result<Self> {
        Self::with_clock(limits, store, Arc::new(SystemClock))
    }

    /// Build limiters sharing `clock`.
    pub fn with_clock(
        limits: &LimitersConfig,
        store: &StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if store.max_store_size == 0 {
            return Err(GatekeepError::Config(
                "store.max_store_size must be positive".to_string(),
            ));
        }

        let build = |purpose: Purpose| -> Result<Arc<RateLimiter>> {
            let config = limits.rule(purpose).to_limiter_config()?;
            info!(
                purpose = %purpose,
                limit = config.limit(),
                window_secs = config.window().as_secs(),
                max_store_size = store.max_store_size,
                "Rate limiter initialized"
            );
            Ok(Arc::new(RateLimiter::with_capacity(
                config,
                clock.clone(),
                store.max_store_size,
            )))
        };

        Ok(Self {
            dashboard: build(Purpose::Dashboard)?,
            public: build(Purpose::Public)?,
            ai_generation: build(Purpose::AiGeneration)?,
            review_submission: build(Purpose::ReviewSubmission)?,
        })
    }

    /// The limiter for `purpose`.
    pub fn get(&self, purpose: Purpose) -> &Arc<RateLimiter> {
        match purpose {
            Purpose::Dashboard => &self.dashboard,
            Purpose::Public => &self.public,
            Purpose::AiGeneration => &self.ai_generation,
            Purpose::ReviewSubmission => &self.review_submission,
        }
    }

    /// Check `identity` against the `purpose` limiter.
    pub fn check(&self, purpose: Purpose, identity: &ClientIdentity) -> Decision {
        let key = RateLimitKey::new(purpose, identity);
        self.get(purpose).check(key.as_str())
    }

    /// Like [`Limiters::check`], but turns a rejection into an error carrying
    /// the retry hint, ready for `?` in a handler.
    pub fn admit(&self, purpose: Purpose, identity: &ClientIdentity) -> Result<Decision> {
        let decision = self.check(purpose, identity);
        if decision.allowed {
            return Ok(decision);
        }

        let retry_after = decision.retry_after.unwrap_or(1);
        debug!(
            purpose = %purpose,
            client = %identity,
            retry_after = retry_after,
            "Request refused"
        );
        Err(GatekeepError::RateLimited {
            purpose,
            retry_after,
        })
    }

    /// Start a passive sweeper for every limiter.
    pub fn spawn_sweepers(&self, interval: Duration) -> Vec<SweeperHandle> {
        Purpose::ALL
            .iter()
            .map(|purpose| self.get(*purpose).spawn_sweeper(interval))
            .collect()
    }

    /// Keys resident across all limiters.
    pub fn total_entries(&self) -> usize {
        Purpose::ALL.iter().map(|p| self.get(*p).len()).sum()
    }
}

/// Stop every sweeper and wait for them to exit.
pub async fn shutdown_sweepers(handles: Vec<SweeperHandle>) {
    futures::future::join_all(handles.into_iter().map(SweeperHandle::shutdown)).await;
}
