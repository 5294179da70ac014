//! Provider error taxonomy.
//!
//! Capabilities report failures as [`GeocodeError`]; the orchestrator
//! classifies them to decide how the provider's health changes. None of
//! these ever reach the caller of `resolve`.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a reverse geocoding capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeocodeError {
    /// Provider explicitly refused the request because of its quota.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Provider did not answer within the allowed time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Transient service-side failure (5xx, service unavailable, bad gateway).
    #[error("service error: {0}")]
    ServiceError(String),

    /// Provider cannot be used at all (bad credentials, disabled account).
    ///
    /// Fatal: the provider goes to `Error` on the first occurrence. Report a
    /// temporary outage such as HTTP 503 as [`GeocodeError::ServiceError`]
    /// instead, so it counts toward `max_consecutive_failures`.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Anything else, e.g. a malformed response.
    #[error("unexpected error: {0}")]
    Unknown(String),
}

/// How a failure affects provider health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Always moves the provider into `RateLimited`.
    RateLimited,
    /// Counts toward the consecutive-failure threshold.
    Transient,
    /// Moves the provider into `Error` immediately.
    Fatal,
}

impl GeocodeError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::RateLimited(_) => FailureClass::RateLimited,
            Self::Timeout(_) | Self::ServiceError(_) => FailureClass::Transient,
            Self::Unavailable(_) | Self::Unknown(_) => FailureClass::Fatal,
        }
    }
}
