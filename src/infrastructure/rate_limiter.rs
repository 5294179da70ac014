//! Rate Limiter
//!
//! Token bucket used to pace requests to a single provider.

use std::time::{Duration, Instant};

/// Tolerance for float drift when a waiter wakes exactly on time.
const TOKEN_EPSILON: f64 = 1e-9;

/// Token bucket rate limiter.
///
/// Holds up to `burst` tokens and refills `rate` tokens per second. With a
/// burst of one this is a strict pacer: consecutive acquisitions are at
/// least `1 / rate` seconds apart. A non-positive or non-finite rate means
/// unlimited.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Option<Instant>,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            rate: rate_per_sec,
            capacity,
            tokens: capacity,
            last_refill: None,
        }
    }

    /// Strict pacer allowing one request every `1 / rate_per_sec` seconds.
    pub fn pacer(rate_per_sec: f64) -> Self {
        Self::new(rate_per_sec, 1)
    }

    pub fn is_unlimited(&self) -> bool {
        !(self.rate.is_finite() && self.rate > 0.0)
    }

    fn refill(&mut self, now: Instant) {
        if let Some(last) = self.last_refill {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        }
        self.last_refill = Some(now);
    }

    /// Take one token, or report how long to wait before one is available.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        if self.is_unlimited() {
            return Ok(());
        }

        self.refill(now);

        if self.tokens + TOKEN_EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            Ok(())
        } else {
            let missing = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(missing / self.rate))
        }
    }
}
