//! Reverse Geocoder Port
//!
//! Defines the capability every provider integration implements.

use crate::domain::error::GeocodeError;
use crate::domain::value_objects::Coordinates;
use async_trait::async_trait;

/// Capability that turns coordinates into a human-readable address.
///
/// This is an outbound port. Each provider (Nominatim, Photon, a paid API,
/// a test double) is a separate implementation selected at startup; the
/// orchestrator never knows which protocol sits behind it.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Reverse geocode a position.
    ///
    /// Returns `Ok(None)` when the provider answered but had no address
    /// for this position. Timeouts are enforced by the caller, so
    /// implementations do not need their own.
    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeocodeError>;
}
