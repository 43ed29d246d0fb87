//! Rate limiting logic and state management.

mod clock;
mod entry;
mod key;
mod limiter;
mod registry;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{RateLimitEntry, RateLimiterConfig};
pub use key::{ClientIdentity, Purpose, RateLimitKey};
pub use limiter::{Decision, LimiterStats, RateLimiter, MAX_STORE_SIZE};
pub use registry::{shutdown_sweepers, Limiters};
pub use sweeper::{SweeperHandle, DEFAULT_SWEEP_INTERVAL};
