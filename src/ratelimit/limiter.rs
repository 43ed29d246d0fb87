//! Core fixed-window rate limiter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{RateLimitEntry, RateLimiterConfig};

/// Default ceiling on resident keys per limiter instance.
pub const MAX_STORE_SIZE: usize = 10_000;
/// Eviction removes one tenth of the store ceiling at a time.
const EVICTION_DIVISOR: usize = 10;

/// Outcome of a single [`RateLimiter::check`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Quota left in the current window after this call
    pub remaining: u32,
    /// Seconds until the window resets, set only on rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl Decision {
    fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after: None,
        }
    }

    fn rejected(retry_after: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }
}

/// Point-in-time totals for a limiter instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub allowed: u64,
    pub rejected: u64,
    pub swept: u64,
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    allowed: AtomicU64,
    rejected: AtomicU64,
    swept: AtomicU64,
    evicted: AtomicU64,
}

/// A keyed fixed-window request counter with bounded memory.
///
/// Each key gets `limit` requests per window; the window opens on the first
/// request after the previous one ended. The store never holds more than
/// `max_store_size` keys: when a new key arrives at capacity, expired entries
/// are swept first, and if that frees nothing the entries whose windows end
/// soonest are evicted.
///
/// The whole read-check-mutate sequence runs under a single lock, so the
/// limiter can be shared across threads without over-admitting.
pub struct RateLimiter {
    config: RateLimiterConfig,
    max_store_size: usize,
    store: Mutex<HashMap<String, RateLimitEntry>>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl RateLimiter {
    /// Create a limiter backed by the system clock.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(config, clock, MAX_STORE_SIZE)
    }

    /// Create a limiter with a custom store ceiling.
    ///
    /// A ceiling of zero is treated as one.
    pub fn with_capacity(
        config: RateLimiterConfig,
        clock: Arc<dyn Clock>,
        max_store_size: usize,
    ) -> Self {
        Self {
            config,
            max_store_size: max_store_size.max(1),
            store: Mutex::new(HashMap::new()),
            clock,
            counters: Counters::default(),
        }
    }

    /// Decide whether a request for `key` is within quota, and count it if so.
    ///
    /// Rejections leave the stored count untouched.
    pub fn check(&self, key: &str) -> Decision {
        let now = self.clock.now_millis();
        let limit = self.config.limit();
        let window_millis = self.config.window_millis();

        let mut store = self.store.lock();

        let decision = match store.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                if entry.count >= limit {
                    let retry_after = entry.retry_after_secs(now);
                    debug!(
                        key = %key,
                        count = entry.count,
                        retry_after = retry_after,
                        "Rate limit exceeded"
                    );
                    Decision::rejected(retry_after)
                } else {
                    entry.count += 1;
                    Decision::allowed(limit - entry.count)
                }
            }
            Some(entry) => {
                trace!(key = %key, "Window expired, starting a new one");
                *entry = RateLimitEntry::new(now, window_millis);
                Decision::allowed(limit - 1)
            }
            None => {
                if store.len() >= self.max_store_size {
                    self.make_room(&mut store, now);
                }
                store.insert(key.to_string(), RateLimitEntry::new(now, window_millis));
                Decision::allowed(limit - 1)
            }
        };

        drop(store);

        let counter = if decision.allowed {
            &self.counters.allowed
        } else {
            &self.counters.rejected
        };
        counter.fetch_add(1, Ordering::Relaxed);

        trace!(
            key = %key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Checked rate limit"
        );

        decision
    }

    /// Remove every entry whose window has ended.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut store = self.store.lock();
        let removed = Self::sweep_expired(&mut store, now);
        let remaining = store.len();
        drop(store);

        if removed > 0 {
            self.counters.swept.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed = removed, remaining = remaining, "Swept expired rate limit entries");
        }
        removed
    }

    /// Free space for a new key once the store has reached its ceiling.
    fn make_room(&self, store: &mut HashMap<String, RateLimitEntry>, now: u64) {
        let swept = Self::sweep_expired(store, now);
        if swept > 0 {
            self.counters.swept.fetch_add(swept as u64, Ordering::Relaxed);
            debug!(removed = swept, "Swept expired entries at capacity");
        }

        if store.len() < self.max_store_size {
            return;
        }

        let to_evict = self
            .max_store_size
            .div_ceil(EVICTION_DIVISOR)
            .min(store.len());

        // Windows ending soonest go first.
        let mut candidates: Vec<(u64, &String)> = store
            .iter()
            .map(|(key, entry)| (entry.reset_at, key))
            .collect();
        candidates.select_nth_unstable_by_key(to_evict - 1, |&(reset_at, _)| reset_at);
        let victims: Vec<String> = candidates[..to_evict]
            .iter()
            .map(|&(_, key)| key.clone())
            .collect();

        for key in &victims {
            store.remove(key);
        }

        self.counters
            .evicted
            .fetch_add(victims.len() as u64, Ordering::Relaxed);
        warn!(
            evicted = victims.len(),
            capacity = self.max_store_size,
            "Rate limit store full of live entries, evicted soonest-expiring keys"
        );
    }

    fn sweep_expired(store: &mut HashMap<String, RateLimitEntry>, now: u64) -> usize {
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired(now));
        before - store.len()
    }

    /// The current state for `key`, if any.
    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.store.lock().get(key).copied()
    }

    /// Number of resident keys.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Whether no keys are resident.
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.store.lock().clear();
    }

    /// This limiter's configuration.
    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }

    /// The store ceiling.
    pub fn max_store_size(&self) -> usize {
        self.max_store_size
    }

    /// Totals since construction.
    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            allowed: self.counters.allowed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            swept: self.counters.swept.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("max_store_size", &self.max_store_size)
            .field("len", &self.len())
            .finish()
    }
}
