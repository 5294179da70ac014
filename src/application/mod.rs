//! Application Layer
//!
//! Use cases that orchestrate the domain: the provider catalog, the
//! failover geocoding service, and usage statistics.

pub mod geocoding_service;
pub mod provider_catalog;
pub mod stats;

pub use geocoding_service::{GeocodingService, ProviderStatusReport, ResolveSettings};
pub use provider_catalog::{CapabilityRegistry, ProviderCatalog, ProviderCredentials};
pub use stats::{ProviderUsage, Stats, StatsCollector};
