//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// Cache key: coordinates rounded to a fixed number of decimal places.
///
/// Stored as scaled integers so that equality and hashing are exact.
/// Four decimal places is roughly 11 m at the equator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat_scaled: i64,
    lng_scaled: i64,
}

impl CacheKey {
    /// Maximum supported precision; beyond this f64 scaling stops being exact.
    pub const MAX_PRECISION: u32 = 9;

    pub fn new(coords: Coordinates, precision: u32) -> Self {
        let factor = 10f64.powi(precision.min(Self::MAX_PRECISION) as i32);
        Self {
            lat_scaled: (coords.latitude * factor).round() as i64,
            lng_scaled: (coords.longitude * factor).round() as i64,
        }
    }
}

/// Runtime status of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Eligible, subject only to rate limiting
    Healthy,
    /// Provider refused a request because of quota; cooling down
    RateLimited,
    /// Too many failures (or a fatal one); cooling down
    Error,
    /// Disabled by an operator until manually reset
    Unavailable,
}

impl ProviderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::RateLimited => "rate_limited",
            Self::Error => "error",
            Self::Unavailable => "unavailable",
        }
    }
}

impl Default for ProviderStatus {
    fn default() -> Self {
        Self::Healthy
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The built-in reverse geocoding services.
///
/// Free services come first in priority; keyed services are only enabled
/// when credentials are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OpenStreetMap Nominatim (free, 1 req/s)
    Nominatim,
    /// Komoot Photon, OpenStreetMap based (free)
    Photon,
    /// Esri ArcGIS (free tier)
    ArcGis,
    /// Google Maps Geocoding v3 (paid)
    GoogleV3,
    /// MapBox (freemium)
    MapBox,
    /// HERE v7 (freemium)
    HereV7,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        Self::Nominatim,
        Self::Photon,
        Self::ArcGis,
        Self::GoogleV3,
        Self::MapBox,
        Self::HereV7,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nominatim => "Nominatim",
            Self::Photon => "Photon",
            Self::ArcGis => "ArcGIS",
            Self::GoogleV3 => "GoogleV3",
            Self::MapBox => "MapBox",
            Self::HereV7 => "HereV7",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::GoogleV3 | Self::MapBox | Self::HereV7)
    }

    /// Default maximum requests per second.
    pub fn default_rate_limit(&self) -> f64 {
        match self {
            Self::Nominatim => 1.0,
            Self::Photon => 10.0,
            Self::ArcGis => 5.0,
            Self::GoogleV3 => 50.0,
            Self::MapBox => 10.0,
            Self::HereV7 => 5.0,
        }
    }

    /// Default priority rank (lower = tried first).
    pub fn default_priority(&self) -> u32 {
        match self {
            Self::Nominatim => 1,
            Self::Photon => 2,
            Self::ArcGis => 3,
            Self::GoogleV3 => 4,
            Self::MapBox => 5,
            Self::HereV7 => 6,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(300)
    }

    pub fn default_max_consecutive_failures(&self) -> u32 {
        3
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
