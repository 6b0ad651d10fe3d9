//! Time source for expiry decisions.

use chrono::{DateTime, Utc};

/// Wall-clock source. Swapped out in tests to pin `expires_at` exactly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
