//! revgeo Library
//!
//! Multi-provider reverse geocoding with priority failover, per-provider
//! rate limiting and health tracking, and an in-process result cache.
//!
//! Provider protocols are plugged in through the
//! [`ReverseGeocoder`](domain::ports::ReverseGeocoder) port; this crate
//! decides which provider to ask, when, and what to remember.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::ApiServer;
pub use adapters::outbound::DashMapAddressStore;
pub use application::{
    CapabilityRegistry, GeocodingService, ProviderCatalog, ProviderCredentials, ProviderStatusReport,
    ResolveSettings, Stats,
};
pub use config::{load_config, Config};
pub use domain::entities::{Provider, ProviderConfig};
pub use domain::error::GeocodeError;
pub use domain::ports::{AddressStore, Clock, ReverseGeocoder};
pub use domain::value_objects::{Coordinates, ProviderKind, ProviderStatus};
pub use infrastructure::{CacheSettings, ManualClock, SystemClock};
