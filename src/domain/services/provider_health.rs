//! Provider Health State Machine
//!
//! Pure domain logic for deciding whether a provider may be tried and how
//! an attempt's outcome changes its status. Time is passed in by the
//! caller; nothing here reads a clock.

use crate::domain::error::FailureClass;
use crate::domain::value_objects::ProviderStatus;
use std::time::{Duration, Instant};

/// Outcome of asking whether a provider may be tried now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Provider is healthy; go ahead.
    Ready,
    /// Cool-down elapsed; this caller is the single recovery attempt.
    Probe,
    /// Still cooling down for the given duration.
    CoolingDown(Duration),
    /// Another caller is currently running the recovery attempt.
    ProbeInFlight,
    /// Disabled by an operator.
    Disabled,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Ready | Self::Probe)
    }
}

/// Runtime health of one provider.
///
/// `RateLimited` and `Error` always carry at least one consecutive failure;
/// the provider becomes eligible again once `retry_after` has passed since
/// the last attempt.
#[derive(Debug, Clone, Default)]
pub struct ProviderHealth {
    status: ProviderStatus,
    consecutive_failures: u32,
    last_attempt: Option<Instant>,
    /// A recovery attempt has been admitted and has not reported back yet
    probing: bool,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ProviderStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    fn cool_down_remaining(&self, now: Instant, retry_after: Duration) -> Option<Duration> {
        let last = self.last_attempt?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed > retry_after {
            None
        } else {
            Some(retry_after - elapsed)
        }
    }

    /// Check-and-claim eligibility in one step.
    ///
    /// When a cool-down has elapsed the status flips back to `Healthy` with
    /// the failure count cleared, and the caller becomes the only one
    /// admitted until it reports an outcome. Must be called once per attempt.
    pub fn admit(&mut self, now: Instant, retry_after: Duration) -> Admission {
        match self.status {
            ProviderStatus::Unavailable => Admission::Disabled,
            ProviderStatus::Healthy if self.probing => Admission::ProbeInFlight,
            ProviderStatus::Healthy => Admission::Ready,
            ProviderStatus::RateLimited | ProviderStatus::Error => {
                match self.cool_down_remaining(now, retry_after) {
                    Some(remaining) => Admission::CoolingDown(remaining),
                    None => {
                        self.status = ProviderStatus::Healthy;
                        self.consecutive_failures = 0;
                        self.probing = true;
                        Admission::Probe
                    }
                }
            }
        }
    }

    /// Side-effect free eligibility check, for status reporting.
    pub fn is_available(&self, now: Instant, retry_after: Duration) -> bool {
        match self.status {
            ProviderStatus::Unavailable => false,
            ProviderStatus::Healthy => !self.probing,
            ProviderStatus::RateLimited | ProviderStatus::Error => {
                self.cool_down_remaining(now, retry_after).is_none()
            }
        }
    }

    /// Whether an admitted caller may still send after waiting for the rate limit.
    ///
    /// A failure recorded in the meantime takes the provider out of rotation
    /// for everyone but the recovery probe that was admitted afterwards.
    pub fn can_send(&self, probe: bool) -> bool {
        self.status == ProviderStatus::Healthy && (probe || !self.probing)
    }

    /// Record the moment a request is actually sent.
    pub fn mark_attempt(&mut self, at: Instant) {
        self.last_attempt = Some(at);
    }

    pub fn record_success(&mut self) {
        self.status = ProviderStatus::Healthy;
        self.consecutive_failures = 0;
        self.probing = false;
    }

    /// The provider answered but had no address; health is unchanged.
    pub fn record_no_result(&mut self) {
        self.probing = false;
    }

    /// Apply a failure and return the resulting status.
    pub fn record_failure(&mut self, class: FailureClass, max_consecutive_failures: u32) -> ProviderStatus {
        self.probing = false;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        match class {
            FailureClass::RateLimited => self.status = ProviderStatus::RateLimited,
            FailureClass::Transient => {
                if self.consecutive_failures >= max_consecutive_failures {
                    self.status = ProviderStatus::Error;
                }
            }
            FailureClass::Fatal => self.status = ProviderStatus::Error,
        }

        self.status
    }

    /// Give up an admitted attempt without an outcome.
    pub fn release(&mut self) {
        self.probing = false;
    }

    /// Operator override back to `Healthy`.
    pub fn reset(&mut self) {
        self.status = ProviderStatus::Healthy;
        self.consecutive_failures = 0;
        self.probing = false;
    }

    /// Operator override to `Unavailable`.
    pub fn disable(&mut self) {
        self.status = ProviderStatus::Unavailable;
        self.probing = false;
    }
}
