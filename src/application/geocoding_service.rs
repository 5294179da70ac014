//! Geocoding Service - Main application use case
//!
//! Resolves coordinates to an address by walking the provider catalog in
//! priority order, failing over past providers that are cooling down or
//! that fail, and caching what it finds.

use crate::application::provider_catalog::{CapabilityRegistry, ProviderCatalog};
use crate::application::stats::{ProviderUsage, Stats, StatsCollector};
use crate::config::Config;
use crate::domain::entities::Provider;
use crate::domain::error::{FailureClass, GeocodeError};
use crate::domain::ports::{AddressStore, Clock};
use crate::domain::services::{Admission, ProviderHealth};
use crate::domain::value_objects::{Coordinates, ProviderStatus};
use crate::infrastructure::{CacheSettings, ResultCache, TokenBucket};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-lookup limits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveSettings {
    /// Default number of providers to attempt (None = all)
    pub max_providers: Option<usize>,
    /// Overall time budget for one lookup (None = unbounded)
    pub deadline: Option<Duration>,
}

/// Status of one provider, as reported to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatusReport {
    pub status: ProviderStatus,
    pub consecutive_failures: u32,
    /// Milliseconds since the last request was sent, if any
    pub last_attempt_ms_ago: Option<u64>,
    /// Whether the provider would be tried right now
    pub available: bool,
    pub priority: u32,
    pub usage_stats: ProviderUsage,
}

/// Runtime state kept for each provider.
///
/// `health` is only ever locked briefly; `pacer` is held while a caller
/// waits out the provider's rate limit, so waiting never blocks status
/// reads or other providers.
struct ProviderSlot {
    provider: Provider,
    health: Mutex<ProviderHealth>,
    pacer: tokio::sync::Mutex<TokenBucket>,
}

impl ProviderSlot {
    fn new(provider: Provider) -> Self {
        let pacer = TokenBucket::pacer(provider.config.rate_limit);
        Self {
            provider,
            health: Mutex::new(ProviderHealth::new()),
            pacer: tokio::sync::Mutex::new(pacer),
        }
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Clears an admitted recovery probe if the attempt is dropped midway.
struct ProbeGuard<'a> {
    health: &'a Mutex<ProviderHealth>,
    armed: bool,
}

impl ProbeGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.health.lock().release();
        }
    }
}

enum AttemptOutcome {
    Found(String),
    NoResult,
    Failed,
    /// The lookup deadline passed before the request could be sent.
    Abandoned,
    /// The provider left rotation while this caller waited for its rate limit.
    Skipped,
}

/// Multi-provider reverse geocoding with failover.
///
/// Owns the provider health table, the result cache, and the counters.
/// Safe to share between tasks behind an `Arc`.
pub struct GeocodingService {
    slots: Vec<ProviderSlot>,
    cache: ResultCache,
    store: Option<Arc<dyn AddressStore>>,
    stats: StatsCollector,
    clock: Arc<dyn Clock>,
    settings: ResolveSettings,
}

impl GeocodingService {
    /// Create a service with default cache and lookup settings.
    pub fn new(catalog: ProviderCatalog, clock: Arc<dyn Clock>) -> Self {
        let stats = StatsCollector::new();
        let slots: Vec<ProviderSlot> = catalog
            .into_iter()
            .map(|provider| {
                stats.register_provider(provider.name());
                ProviderSlot::new(provider)
            })
            .collect();

        Self {
            slots,
            cache: ResultCache::new(CacheSettings::default(), clock.clone()),
            store: None,
            stats,
            clock,
            settings: ResolveSettings::default(),
        }
    }

    pub fn with_cache_settings(mut self, settings: CacheSettings) -> Self {
        self.cache = ResultCache::new(settings, self.clock.clone());
        self
    }

    pub fn with_resolve_settings(mut self, settings: ResolveSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build a service from configuration with the built-in provider table.
    pub fn from_config(config: &Config, registry: &CapabilityRegistry, clock: Arc<dyn Clock>) -> Self {
        Self::new(ProviderCatalog::from_config(config, registry), clock)
            .with_cache_settings(config.cache_settings())
            .with_resolve_settings(config.resolve_settings())
    }

    /// Attach a look-aside persistent address store.
    pub fn with_store(mut self, store: Arc<dyn AddressStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Resolve coordinates to an address.
    ///
    /// Tries at most `max_providers` eligible providers (falling back to the
    /// configured default, then to all; zero also means all). Returns `None`
    /// when no provider produced an address. Provider errors never surface.
    pub async fn resolve(&self, latitude: f64, longitude: f64, max_providers: Option<usize>) -> Option<String> {
        let coords = Coordinates::new(latitude, longitude);
        self.stats.record_request();

        if !coords.is_valid() {
            tracing::warn!("refusing to geocode invalid coordinates ({}, {})", latitude, longitude);
            self.stats.record_failure();
            return None;
        }

        if let Some(address) = self.cache.get(coords) {
            self.stats.record_cache_hit();
            tracing::debug!("cache hit for {}: {}", coords, address);
            return Some(address);
        }

        if let Some(address) = self.lookup_store(coords).await {
            self.cache.put(coords, address.clone());
            self.stats.record_store_hit();
            tracing::debug!("address store hit for {}: {}", coords, address);
            return Some(address);
        }

        let started = self.clock.now();
        let limit = max_providers
            .or(self.settings.max_providers)
            .filter(|n| *n > 0)
            .unwrap_or(self.slots.len());
        let mut tried = 0;

        for slot in &self.slots {
            if tried >= limit {
                break;
            }

            if self.remaining_budget(started, self.clock.now()) == Some(Duration::ZERO) {
                tracing::warn!("lookup deadline reached for {} after {} providers", coords, tried);
                break;
            }

            let admission = slot
                .health
                .lock()
                .admit(self.clock.now(), slot.provider.config.retry_after);

            if !admission.is_admitted() {
                tracing::debug!("skipping provider {}: {:?}", slot.name(), admission);
                continue;
            }

            let probe = admission == Admission::Probe;
            if probe {
                tracing::info!("provider {} is available for retry", slot.name());
            }
            tracing::debug!("trying provider {} ({}/{})", slot.name(), tried + 1, limit);

            match self.attempt(slot, coords, started, probe).await {
                AttemptOutcome::Found(address) => {
                    self.cache.put(coords, address.clone());
                    self.save_to_store(coords, &address).await;
                    self.stats.record_success();
                    tracing::info!("geocoded {} with {}", coords, slot.name());
                    return Some(address);
                }
                AttemptOutcome::NoResult | AttemptOutcome::Failed => tried += 1,
                AttemptOutcome::Skipped => {
                    tracing::debug!("skipping provider {}: left rotation while rate limited", slot.name());
                }
                AttemptOutcome::Abandoned => {
                    tracing::warn!("lookup deadline reached for {} while waiting on {}", coords, slot.name());
                    break;
                }
            }
        }

        tracing::warn!("all available providers failed for {}", coords);
        self.stats.record_failure();
        None
    }

    fn remaining_budget(&self, started: Instant, now: Instant) -> Option<Duration> {
        let deadline = self.settings.deadline?;
        let elapsed = now.saturating_duration_since(started);
        Some(deadline.saturating_sub(elapsed))
    }

    /// Wait for the provider's rate limit, send one request, record the outcome.
    async fn attempt(&self, slot: &ProviderSlot, coords: Coordinates, started: Instant, probe: bool) -> AttemptOutcome {
        let mut guard = ProbeGuard {
            health: &slot.health,
            armed: probe,
        };
        let config = &slot.provider.config;
        let name = slot.name();

        // Health and budget are re-checked under the health lock before each
        // token is taken, so a caller that waited never sends on stale state.
        let timeout = {
            let mut pacer = slot.pacer.lock().await;
            loop {
                let step = {
                    let mut health = slot.health.lock();
                    let now = self.clock.now();
                    let remaining = self.remaining_budget(started, now);
                    if remaining == Some(Duration::ZERO) {
                        return AttemptOutcome::Abandoned;
                    }
                    if !health.can_send(probe) {
                        return AttemptOutcome::Skipped;
                    }
                    match pacer.try_acquire(now) {
                        Ok(()) => {
                            health.mark_attempt(now);
                            Ok(remaining)
                        }
                        Err(wait) => Err((wait, remaining)),
                    }
                };

                match step {
                    Ok(remaining) => break remaining.map_or(config.timeout, |r| config.timeout.min(r)),
                    Err((wait, Some(remaining))) if wait >= remaining => return AttemptOutcome::Abandoned,
                    Err((wait, _)) => {
                        tracing::debug!("rate limiting: sleeping {:?} for {}", wait, name);
                        self.clock.sleep(wait).await;
                    }
                }
            }
        };

        self.stats.record_provider_request(name);
        tracing::debug!("geocoding {} with {}", coords, name);

        let result = match tokio::time::timeout(timeout, slot.provider.geocoder.reverse(coords)).await {
            Ok(result) => result,
            Err(_) => Err(GeocodeError::Timeout(timeout)),
        };
        guard.disarm();

        match result {
            Ok(Some(address)) if !address.trim().is_empty() => {
                slot.health.lock().record_success();
                self.stats.record_provider_success(name);
                tracing::debug!("geocoded with {}: {}", name, address);
                AttemptOutcome::Found(address)
            }
            Ok(_) => {
                slot.health.lock().record_no_result();
                self.stats.record_provider_no_result(name);
                tracing::warn!("no address found with {}", name);
                AttemptOutcome::NoResult
            }
            Err(err) => {
                let class = err.class();
                let status = slot
                    .health
                    .lock()
                    .record_failure(class, config.max_consecutive_failures);
                self.stats.record_provider_failure(name);

                match class {
                    FailureClass::RateLimited => {
                        tracing::warn!("rate limited by {}: {}", name, err);
                    }
                    FailureClass::Transient if status == ProviderStatus::Error => {
                        tracing::error!(
                            "provider {} marked as error after {} consecutive failures: {}",
                            name,
                            config.max_consecutive_failures,
                            err
                        );
                    }
                    FailureClass::Transient => {
                        tracing::warn!("geocoding error with {}: {}", name, err);
                    }
                    FailureClass::Fatal => {
                        tracing::error!("unexpected error with {}: {}", name, err);
                    }
                }
                AttemptOutcome::Failed
            }
        }
    }

    async fn lookup_store(&self, coords: Coordinates) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.get(coords).await {
            Ok(Some(address)) if !address.trim().is_empty() => Some(address),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("address store lookup failed: {}", e);
                None
            }
        }
    }

    async fn save_to_store(&self, coords: Coordinates, address: &str) {
        if let Some(store) = &self.store {
            if let Err(e) = store.put(coords, address).await {
                tracing::debug!("address store write failed: {}", e);
            }
        }
    }

    fn slot(&self, name: &str) -> Option<&ProviderSlot> {
        self.slots.iter().find(|s| s.name() == name)
    }

    /// Health and usage of every provider, keyed by name.
    pub fn provider_status(&self) -> BTreeMap<String, ProviderStatusReport> {
        let now = self.clock.now();
        self.slots
            .iter()
            .map(|slot| {
                let health = slot.health.lock().clone();
                let report = ProviderStatusReport {
                    status: health.status(),
                    consecutive_failures: health.consecutive_failures(),
                    last_attempt_ms_ago: health
                        .last_attempt()
                        .map(|at| now.saturating_duration_since(at).as_millis() as u64),
                    available: health.is_available(now, slot.provider.config.retry_after),
                    priority: slot.provider.config.priority,
                    usage_stats: self.stats.provider_usage(slot.name()),
                };
                (slot.name().to_string(), report)
            })
            .collect()
    }

    /// Snapshot of all counters plus the current cache size.
    pub fn stats(&self) -> Stats {
        self.stats.snapshot(self.cache.len())
    }

    /// Provider names in priority order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name()).collect()
    }

    /// Whether a provider would be tried right now, without claiming it.
    pub fn is_available(&self, name: &str) -> Option<bool> {
        let slot = self.slot(name)?;
        let now = self.clock.now();
        Some(slot.health.lock().is_available(now, slot.provider.config.retry_after))
    }

    /// Force a provider back to healthy. Returns false for unknown names.
    pub fn reset_provider(&self, name: &str) -> bool {
        match self.slot(name) {
            Some(slot) => {
                slot.health.lock().reset();
                tracing::info!("reset provider {} to healthy status", name);
                true
            }
            None => false,
        }
    }

    /// Take a provider out of rotation until `reset_provider` is called.
    pub fn disable_provider(&self, name: &str) -> bool {
        match self.slot(name) {
            Some(slot) => {
                slot.health.lock().disable();
                tracing::warn!("provider {} disabled by operator", name);
                true
            }
            None => false,
        }
    }

    /// Empty the result cache and return how many entries were dropped.
    pub fn clear_cache(&self) -> usize {
        let count = self.cache.clear();
        tracing::info!("cleared geocoding cache ({} entries)", count);
        count
    }

    pub fn purge_expired_cache(&self) -> usize {
        let count = self.cache.purge_expired();
        if count > 0 {
            tracing::debug!("purged {} expired cache entries", count);
        }
        count
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
        tracing::info!("geocoding statistics reset");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::ProviderConfig;
    use crate::domain::ports::ReverseGeocoder;
    use crate::infrastructure::ManualClock;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted responses, repeating the last one forever.
    struct Scripted {
        responses: Mutex<VecDeque<Result<Option<String>, GeocodeError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Option<String>, GeocodeError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn ok(addr: &str) -> Arc<Self> {
            Self::new(vec![Ok(Some(addr.to_string()))])
        }

        fn err(e: GeocodeError) -> Arc<Self> {
            Self::new(vec![Err(e)])
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReverseGeocoder for Scripted {
        async fn reverse(&self, _coords: Coordinates) -> Result<Option<String>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock();
            if responses.len() > 1 {
                responses.pop_front().unwrap_or(Ok(None))
            } else {
                responses.front().cloned().unwrap_or(Ok(None))
            }
        }
    }

    fn service(providers: Vec<(ProviderConfig, Arc<Scripted>)>) -> (GeocodingService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let catalog = ProviderCatalog::new(
            providers
                .into_iter()
                .map(|(cfg, g)| Provider::new(cfg, g as Arc<dyn ReverseGeocoder>))
                .collect(),
        );
        (GeocodingService::new(catalog, clock.clone()), clock)
    }

    fn fast(name: &str, priority: u32) -> ProviderConfig {
        ProviderConfig::new(name, priority).with_rate_limit(0.0)
    }

    fn timeout() -> GeocodeError {
        GeocodeError::Timeout(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_resolve_first_provider() {
        let p1 = Scripted::ok("1 First St");
        let p2 = Scripted::ok("2 Second St");
        let (svc, _) = service(vec![(fast("p1", 1), p1.clone()), (fast("p2", 2), p2.clone())]);

        assert_eq!(svc.resolve(40.0, -74.0, None).await.as_deref(), Some("1 First St"));
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn test_priority_failover() {
        let p1 = Scripted::err(GeocodeError::ServiceError("502".into()));
        let p2 = Scripted::ok("2 Second St");
        let (svc, _) = service(vec![(fast("p2", 2), p2.clone()), (fast("p1", 1), p1.clone())]);

        assert_eq!(svc.resolve(40.0, -74.0, None).await.as_deref(), Some("2 Second St"));
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_providers() {
        let p1 = Scripted::ok("1 First St");
        let (svc, _) = service(vec![(fast("p1", 1), p1.clone())]);

        svc.resolve(40.0, -74.0, None).await;
        svc.resolve(40.00001, -74.00001, None).await;

        assert_eq!(p1.calls(), 1);
        let stats = svc.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.successful_geocodes, 1);
        assert_eq!(stats.cache_size, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_counts_one_failure() {
        let p1 = Scripted::err(timeout());
        let p2 = Scripted::err(GeocodeError::RateLimited("429".into()));
        let p3 = Scripted::err(GeocodeError::Unknown("bad json".into()));
        let (svc, _) = service(vec![
            (fast("p1", 1), p1),
            (fast("p2", 2), p2),
            (fast("p3", 3), p3),
        ]);

        assert!(svc.resolve(1.0, 1.0, None).await.is_none());

        let stats = svc.stats();
        assert_eq!(stats.failed_geocodes, 1);
        assert_eq!(stats.successful_geocodes, 0);
        assert_eq!(stats.per_provider["p1"].failures, 1);
        assert_eq!(stats.per_provider["p2"].failures, 1);
        assert_eq!(stats.per_provider["p3"].failures, 1);
    }

    #[tokio::test]
    async fn test_failure_classification_drives_status() {
        let p1 = Scripted::err(timeout());
        let p2 = Scripted::err(GeocodeError::RateLimited("429".into()));
        let p3 = Scripted::err(GeocodeError::Unavailable("bad key".into()));
        let (svc, _) = service(vec![
            (fast("p1", 1), p1),
            (fast("p2", 2), p2),
            (fast("p3", 3), p3),
        ]);

        svc.resolve(1.0, 1.0, None).await;
        let status = svc.provider_status();

        assert_eq!(status["p1"].status, ProviderStatus::Healthy);
        assert_eq!(status["p1"].consecutive_failures, 1);
        assert_eq!(status["p2"].status, ProviderStatus::RateLimited);
        assert_eq!(status["p3"].status, ProviderStatus::Error);
        assert_eq!(status["p3"].consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_max_providers_limits_attempts() {
        let p1 = Scripted::err(timeout());
        let p2 = Scripted::err(timeout());
        let p3 = Scripted::ok("3 Third St");
        let (svc, _) = service(vec![
            (fast("p1", 1), p1.clone()),
            (fast("p2", 2), p2.clone()),
            (fast("p3", 3), p3.clone()),
        ]);

        assert!(svc.resolve(1.0, 1.0, Some(2)).await.is_none());
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 1);
        assert_eq!(p3.calls(), 0);
    }

    #[tokio::test]
    async fn test_max_providers_counts_only_attempted() {
        let p1 = Scripted::ok("1 First St");
        let p2 = Scripted::ok("2 Second St");
        let (svc, _) = service(vec![(fast("p1", 1), p1.clone()), (fast("p2", 2), p2.clone())]);

        svc.disable_provider("p1");
        assert_eq!(svc.resolve(1.0, 1.0, Some(1)).await.as_deref(), Some("2 Second St"));
        assert_eq!(p1.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_max_providers_means_all() {
        let p1 = Scripted::err(timeout());
        let p2 = Scripted::ok("2 Second St");
        let (svc, _) = service(vec![(fast("p1", 1), p1), (fast("p2", 2), p2)]);

        assert_eq!(svc.resolve(1.0, 1.0, Some(0)).await.as_deref(), Some("2 Second St"));
    }

    #[tokio::test]
    async fn test_configured_default_max_providers() {
        let p1 = Scripted::err(timeout());
        let p2 = Scripted::ok("2 Second St");
        let (svc, _) = service(vec![(fast("p1", 1), p1), (fast("p2", 2), p2.clone())]);
        let svc = svc.with_resolve_settings(ResolveSettings {
            max_providers: Some(1),
            deadline: None,
        });

        assert!(svc.resolve(1.0, 1.0, None).await.is_none());
        assert_eq!(p2.calls(), 0);
        // Explicit argument wins over the default
        assert_eq!(svc.resolve(1.0, 1.0, Some(2)).await.as_deref(), Some("2 Second St"));
    }

    #[tokio::test]
    async fn test_empty_address_fails_over_without_penalty() {
        let p1 = Scripted::new(vec![Ok(Some("   ".to_string()))]);
        let p2 = Scripted::ok("2 Second St");
        let (svc, _) = service(vec![(fast("p1", 1), p1), (fast("p2", 2), p2)]);

        assert_eq!(svc.resolve(1.0, 1.0, None).await.as_deref(), Some("2 Second St"));

        let status = svc.provider_status();
        assert_eq!(status["p1"].status, ProviderStatus::Healthy);
        assert_eq!(status["p1"].consecutive_failures, 0);
        assert_eq!(status["p1"].usage_stats.no_results, 1);
        assert_eq!(status["p1"].usage_stats.failures, 0);
    }

    #[tokio::test]
    async fn test_cool_down_then_recovery() {
        let cfg = fast("p1", 1)
            .with_max_consecutive_failures(2)
            .with_retry_after(Duration::from_secs(60));
        let p1 = Scripted::new(vec![Err(timeout()), Err(timeout()), Ok(Some("back".to_string()))]);
        let (svc, clock) = service(vec![(cfg, p1.clone())]);

        assert!(svc.resolve(1.0, 1.0, None).await.is_none());
        assert!(svc.resolve(2.0, 2.0, None).await.is_none());
        assert_eq!(svc.provider_status()["p1"].status, ProviderStatus::Error);
        assert_eq!(svc.is_available("p1"), Some(false));

        // Still cooling down: not even attempted
        clock.advance(Duration::from_secs(30));
        assert!(svc.resolve(3.0, 3.0, None).await.is_none());
        assert_eq!(p1.calls(), 2);

        clock.advance(Duration::from_secs(31));
        assert_eq!(svc.is_available("p1"), Some(true));
        assert_eq!(svc.resolve(4.0, 4.0, None).await.as_deref(), Some("back"));
        assert_eq!(svc.provider_status()["p1"].status, ProviderStatus::Healthy);
        assert_eq!(svc.provider_status()["p1"].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_spacing() {
        let cfg = ProviderConfig::new("p1", 1).with_rate_limit(2.0);
        let p1 = Scripted::new(vec![Ok(Some("a".to_string()))]);
        let (svc, clock) = service(vec![(cfg, p1.clone())]);

        svc.resolve(1.0, 1.0, None).await;
        svc.resolve(2.0, 2.0, None).await;
        svc.resolve(3.0, 3.0, None).await;

        assert_eq!(p1.calls(), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_millis(500)]
        );
    }

    #[tokio::test]
    async fn test_rate_limit_wait_skipped_after_interval() {
        let cfg = ProviderConfig::new("p1", 1).with_rate_limit(2.0);
        let p1 = Scripted::ok("a");
        let (svc, clock) = service(vec![(cfg, p1)]);

        svc.resolve(1.0, 1.0, None).await;
        clock.advance(Duration::from_secs(1));
        svc.resolve(2.0, 2.0, None).await;

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        struct Slow;

        #[async_trait]
        impl ReverseGeocoder for Slow {
            async fn reverse(&self, _coords: Coordinates) -> Result<Option<String>, GeocodeError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Some("too late".to_string()))
            }
        }

        let clock = Arc::new(crate::infrastructure::SystemClock);
        let catalog = ProviderCatalog::new(vec![
            Provider::new(
                fast("slow", 1).with_timeout(Duration::from_secs(2)),
                Arc::new(Slow),
            ),
            Provider::new(fast("p2", 2), Scripted::ok("2 Second St") as Arc<dyn ReverseGeocoder>),
        ]);
        let svc = GeocodingService::new(catalog, clock);

        assert_eq!(svc.resolve(1.0, 1.0, None).await.as_deref(), Some("2 Second St"));
        let status = svc.provider_status();
        assert_eq!(status["slow"].consecutive_failures, 1);
        assert_eq!(status["slow"].usage_stats.failures, 1);
    }

    #[tokio::test]
    async fn test_invalid_coordinates() {
        let p1 = Scripted::ok("a");
        let (svc, _) = service(vec![(fast("p1", 1), p1.clone())]);

        assert!(svc.resolve(f64::NAN, 0.0, None).await.is_none());
        assert!(svc.resolve(91.0, 0.0, None).await.is_none());
        assert_eq!(p1.calls(), 0);
        assert_eq!(svc.stats().failed_geocodes, 2);
        assert_eq!(svc.stats().requests, 2);
    }

    #[tokio::test]
    async fn test_no_providers() {
        let (svc, _) = service(vec![]);
        assert!(svc.resolve(1.0, 1.0, None).await.is_none());
        assert_eq!(svc.stats().failed_geocodes, 1);
    }

    #[tokio::test]
    async fn test_reset_provider() {
        let p1 = Scripted::new(vec![Err(GeocodeError::Unknown("x".into())), Ok(Some("ok".to_string()))]);
        let (svc, _) = service(vec![(fast("p1", 1), p1)]);

        svc.resolve(1.0, 1.0, None).await;
        assert_eq!(svc.provider_status()["p1"].status, ProviderStatus::Error);

        assert!(svc.reset_provider("p1"));
        assert_eq!(svc.provider_status()["p1"].status, ProviderStatus::Healthy);
        assert_eq!(svc.resolve(1.0, 1.0, None).await.as_deref(), Some("ok"));

        assert!(!svc.reset_provider("missing"));
    }

    #[tokio::test]
    async fn test_disable_provider() {
        let p1 = Scripted::ok("a");
        let (svc, clock) = service(vec![(fast("p1", 1), p1.clone())]);

        assert!(svc.disable_provider("p1"));
        clock.advance(Duration::from_secs(100_000));
        assert!(svc.resolve(1.0, 1.0, None).await.is_none());
        assert_eq!(p1.calls(), 0);
        assert_eq!(svc.provider_status()["p1"].status, ProviderStatus::Unavailable);
        assert!(!svc.disable_provider("missing"));
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let p1 = Scripted::ok("a");
        let (svc, _) = service(vec![(fast("p1", 1), p1.clone())]);

        svc.resolve(1.0, 1.0, None).await;
        assert_eq!(svc.cache_len(), 1);
        assert_eq!(svc.clear_cache(), 1);
        svc.resolve(1.0, 1.0, None).await;
        assert_eq!(p1.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_expiry_triggers_new_lookup() {
        let p1 = Scripted::ok("a");
        let (svc, clock) = service(vec![(fast("p1", 1), p1.clone())]);
        let svc = svc.with_cache_settings(CacheSettings {
            ttl: Duration::from_secs(60),
            ..Default::default()
        });

        svc.resolve(1.0, 1.0, None).await;
        clock.advance(Duration::from_secs(61));
        assert_eq!(svc.purge_expired_cache(), 1);
        svc.resolve(1.0, 1.0, None).await;
        assert_eq!(p1.calls(), 2);
    }

    #[tokio::test]
    async fn test_provider_status_snapshot() {
        let p1 = Scripted::ok("a");
        let (svc, clock) = service(vec![(fast("p1", 1), p1)]);

        let before = svc.provider_status();
        assert_eq!(before["p1"].last_attempt_ms_ago, None);
        assert!(before["p1"].available);
        assert_eq!(before["p1"].priority, 1);

        svc.resolve(1.0, 1.0, None).await;
        clock.advance(Duration::from_millis(1500));

        let after = svc.provider_status();
        assert_eq!(after["p1"].last_attempt_ms_ago, Some(1500));
        assert_eq!(after["p1"].usage_stats.successes, 1);
        // Reading status twice has no side effects
        assert_eq!(svc.provider_status(), after);
    }

    #[tokio::test]
    async fn test_reset_stats() {
        let p1 = Scripted::ok("a");
        let (svc, _) = service(vec![(fast("p1", 1), p1)]);

        svc.resolve(1.0, 1.0, None).await;
        svc.reset_stats();

        let stats = svc.stats();
        assert_eq!(stats.requests, 0);
        assert_eq!(stats.successful_geocodes, 0);
        assert_eq!(stats.per_provider["p1"], ProviderUsage::default());
        // The cache is untouched
        assert_eq!(stats.cache_size, 1);
    }

    #[tokio::test]
    async fn test_deadline_stops_failover() {
        let cfg1 = ProviderConfig::new("p1", 1).with_rate_limit(0.1);
        let p1 = Scripted::err(timeout());
        let p2 = Scripted::ok("2 Second St");
        let (svc, clock) = service(vec![(cfg1, p1.clone()), (fast("p2", 2), p2.clone())]);
        let svc = svc.with_resolve_settings(ResolveSettings {
            max_providers: None,
            deadline: Some(Duration::from_secs(5)),
        });

        // First lookup consumes p1's only token, then fails over to p2
        assert_eq!(svc.resolve(1.0, 1.0, None).await.as_deref(), Some("2 Second St"));

        // Second lookup would have to wait 10 s for p1, more than the 5 s budget
        assert!(svc.resolve(2.0, 2.0, None).await.is_none());
        assert_eq!(p1.calls(), 1);
        assert_eq!(p2.calls(), 1);
        assert!(clock.sleeps().is_empty());
        // The abandoned attempt did not count against p1
        assert_eq!(svc.provider_status()["p1"].consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_deadline_spent_in_rate_limit_wait_takes_no_token() {
        /// Wakes up later than asked, like a busy scheduler.
        struct Oversleeping(Arc<ManualClock>);

        #[async_trait]
        impl Clock for Oversleeping {
            fn now(&self) -> Instant {
                self.0.now()
            }

            async fn sleep(&self, duration: Duration) {
                self.0.sleep(duration * 2).await;
            }
        }

        let manual = Arc::new(ManualClock::new());
        let p1 = Scripted::err(timeout());
        let p2 = Scripted::ok("2 Second St");
        let catalog = ProviderCatalog::new(vec![
            Provider::new(ProviderConfig::new("p1", 1).with_rate_limit(1.0), p1.clone()),
            Provider::new(fast("p2", 2), p2.clone()),
        ]);
        let svc = GeocodingService::new(catalog, Arc::new(Oversleeping(manual.clone()))).with_resolve_settings(
            ResolveSettings {
                max_providers: None,
                deadline: Some(Duration::from_millis(1500)),
            },
        );

        assert_eq!(svc.resolve(1.0, 1.0, None).await.as_deref(), Some("2 Second St"));

        // p1 needs 1 s for its next token, but the wait overruns the 1.5 s budget
        assert!(svc.resolve(2.0, 2.0, None).await.is_none());
        assert_eq!(manual.sleeps(), vec![Duration::from_secs(2)]);
        assert_eq!(p1.calls(), 1);

        let status = svc.provider_status();
        assert_eq!(status["p1"].usage_stats.requests, 1);
        // Still measured from the request sent by the first lookup
        assert_eq!(status["p1"].last_attempt_ms_ago, Some(2000));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_failover_is_logged() {
        let p1 = Scripted::err(GeocodeError::ServiceError("502 bad gateway".into()));
        let p2 = Scripted::ok("2 Second St");
        let (svc, _) = service(vec![(fast("p1", 1), p1), (fast("p2", 2), p2)]);

        svc.resolve(1.0, 1.0, None).await;

        assert!(logs_contain("geocoding error with p1"));
        assert!(logs_contain("502 bad gateway"));
        assert!(logs_contain("geocoded (1.0000, 1.0000) with p2"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_exhaustion_is_logged() {
        let p1 = Scripted::err(GeocodeError::Unavailable("invalid key".into()));
        let (svc, _) = service(vec![(fast("p1", 1), p1)]);

        svc.resolve(1.0, 1.0, None).await;

        assert!(logs_contain("unexpected error with p1"));
        assert!(logs_contain("all available providers failed"));
    }

    #[tokio::test]
    async fn test_from_config() {
        use crate::domain::value_objects::ProviderKind;

        let registry = CapabilityRegistry::new()
            .register(ProviderKind::Photon, |_| Scripted::ok("photon") as Arc<dyn ReverseGeocoder>)
            .register(ProviderKind::Nominatim, |_| {
                Scripted::err(GeocodeError::ServiceError("503".into())) as Arc<dyn ReverseGeocoder>
            });
        let config = Config {
            cache_size: 0,
            ..Default::default()
        };
        let svc = GeocodingService::from_config(&config, &registry, Arc::new(ManualClock::new()));

        assert_eq!(svc.provider_names(), vec!["Nominatim", "Photon"]);
        assert_eq!(svc.resolve(1.0, 1.0, None).await.as_deref(), Some("photon"));
        // A zero-sized cache stores nothing
        assert_eq!(svc.cache_len(), 0);
    }

    #[test]
    fn test_provider_names_in_priority_order() {
        let (svc, _) = service(vec![
            (fast("b", 2), Scripted::ok("b")),
            (fast("a", 1), Scripted::ok("a")),
        ]);
        assert_eq!(svc.provider_names(), vec!["a", "b"]);
        assert_eq!(svc.is_available("zzz"), None);
    }
}
