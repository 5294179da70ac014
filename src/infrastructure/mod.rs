//! Infrastructure Layer
//!
//! Clocks, request pacing, and the in-process result cache.

pub mod clock;
pub mod rate_limiter;
pub mod result_cache;

pub use clock::{ManualClock, SystemClock};
pub use rate_limiter::TokenBucket;
pub use result_cache::{CacheSettings, ResultCache};
