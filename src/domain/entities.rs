//! Domain Entities - Core business objects
//!
//! Provider definitions and cached results. Providers are built once at
//! startup and never mutated afterwards.

use crate::domain::ports::ReverseGeocoder;
use crate::domain::value_objects::ProviderKind;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Static configuration of one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfig {
    /// Unique identifier used in status reports and admin calls
    pub name: String,
    /// Maximum requests per second
    pub rate_limit: f64,
    /// Maximum time a single request may take
    pub timeout: Duration,
    /// Cool-down after the provider is marked RateLimited or Error
    pub retry_after: Duration,
    /// Transient failures in a row before the provider is marked Error
    pub max_consecutive_failures: u32,
    /// Lower = tried first
    pub priority: u32,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            rate_limit: 1.0,
            timeout: Duration::from_secs(10),
            retry_after: Duration::from_secs(300),
            max_consecutive_failures: 3,
            priority,
        }
    }

    /// Configuration with the built-in defaults for a known provider.
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            rate_limit: kind.default_rate_limit(),
            timeout: kind.default_timeout(),
            retry_after: kind.default_retry_after(),
            max_consecutive_failures: kind.default_max_consecutive_failures(),
            priority: kind.default_priority(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: f64) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}

/// A configured provider together with its geocoding capability.
#[derive(Clone)]
pub struct Provider {
    pub config: ProviderConfig,
    pub geocoder: Arc<dyn ReverseGeocoder>,
}

impl Provider {
    pub fn new(config: ProviderConfig, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self { config, geocoder }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A resolved address held by the result cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub address: String,
    pub created_at: Instant,
}

impl CacheEntry {
    pub fn new(address: String, created_at: Instant) -> Self {
        Self {
            address,
            created_at,
        }
    }

    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_for_kind() {
        let cfg = ProviderConfig::for_kind(ProviderKind::Photon);
        assert_eq!(cfg.name, "Photon");
        assert_eq!(cfg.rate_limit, 10.0);
        assert_eq!(cfg.priority, 2);
        assert_eq!(cfg.max_consecutive_failures, 3);
    }

    #[test]
    fn test_builder_methods() {
        let cfg = ProviderConfig::new("custom", 7)
            .with_timeout(Duration::from_secs(2))
            .with_retry_after(Duration::from_secs(60))
            .with_max_consecutive_failures(5);
        assert_eq!(cfg.timeout, Duration::from_secs(2));
        assert_eq!(cfg.retry_after, Duration::from_secs(60));
        assert_eq!(cfg.max_consecutive_failures, 5);
        assert_eq!(cfg.priority, 7);
    }

    #[test]
    fn test_cache_entry_expiry() {
        let start = Instant::now();
        let entry = CacheEntry::new("1 Main St".to_string(), start);
        let ttl = Duration::from_secs(60);

        assert!(!entry.is_expired(start, ttl));
        assert!(!entry.is_expired(start + ttl, ttl));
        assert!(entry.is_expired(start + ttl + Duration::from_millis(1), ttl));
    }
}
