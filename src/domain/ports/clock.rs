//! Clock Port
//!
//! Time source for cool-downs, cache expiry, and rate-limit waits.

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Source of the current time and of delays.
///
/// Injected so that rate limiting and expiry can be tested without
/// waiting on the wall clock.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}
