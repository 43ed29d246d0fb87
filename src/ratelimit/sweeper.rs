//! Background housekeeping for rate limiter stores.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::limiter::RateLimiter;

/// Default interval between passive sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to a running sweeper task.
///
/// Dropping the handle aborts the task; [`SweeperHandle::shutdown`] stops it
/// cooperatively and waits for it to finish.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl RateLimiter {
    /// Start sweeping expired entries every `interval` on the current tokio
    /// runtime.
    ///
    /// The task only holds a weak reference: once every `Arc` to the limiter
    /// is gone it exits on its next tick. A zero interval is raised to one
    /// millisecond.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let interval = interval.max(Duration::from_millis(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let limiter = Arc::downgrade(self);
        let task = tokio::spawn(run_sweeper(limiter, interval, shutdown_rx));

        SweeperHandle {
            shutdown_tx,
            task: Some(task),
        }
    }
}

async fn run_sweeper(
    limiter: Weak<RateLimiter>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(interval_secs = interval.as_secs_f64(), "Rate limit sweeper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(limiter) = limiter.upgrade() else {
                    debug!("Rate limiter dropped, stopping sweeper");
                    break;
                };
                // Nothing to do until the limiter has seen traffic.
                if limiter.is_empty() {
                    continue;
                }
                limiter.sweep();
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Rate limit sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use crate::ratelimit::entry::RateLimiterConfig;

    fn limiter_with_clock() -> (Arc<RateLimiter>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let config = RateLimiterConfig::per_seconds(5, 10).unwrap();
        (Arc::new(RateLimiter::with_clock(config, clock.clone())), clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let (limiter, clock) = limiter_with_clock();
        let handle = limiter.spawn_sweeper(Duration::from_secs(60));

        limiter.check("a");
        limiter.check("b");
        clock.advance(Duration::from_secs(11));
        assert_eq!(limiter.len(), 2);

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(limiter.is_empty());
        assert_eq!(limiter.stats().swept, 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_keeps_live_entries() {
        let (limiter, _clock) = limiter_with_clock();
        let handle = limiter.spawn_sweeper(Duration::from_secs(1));

        limiter.check("live");
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(limiter.len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let (limiter, _clock) = limiter_with_clock();
        let handle = limiter.spawn_sweeper(Duration::from_secs(1));
        assert!(!handle.is_finished());

        handle.shutdown().await;
        assert_eq!(Arc::strong_count(&limiter), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_exits_when_limiter_dropped() {
        let (limiter, _clock) = limiter_with_clock();
        let handle = limiter.spawn_sweeper(Duration::from_secs(1));

        drop(limiter);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(handle.is_finished());
    }
}
