//! Stats Collector
//!
//! Monotonic counters for lookups overall and per provider. Counters only
//! go back to zero through an explicit `reset`.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-provider counters.
#[derive(Debug, Default)]
struct ProviderCounters {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    no_results: AtomicU64,
}

impl ProviderCounters {
    fn snapshot(&self) -> ProviderUsage {
        ProviderUsage {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            no_results: self.no_results.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.no_results.store(0, Ordering::Relaxed);
    }
}

/// Usage of a single provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    /// Requests actually sent
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    /// Answers that carried no address
    pub no_results: u64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub requests: u64,
    pub cache_hits: u64,
    pub store_hits: u64,
    pub successful_geocodes: u64,
    pub failed_geocodes: u64,
    pub cache_size: usize,
    pub per_provider: BTreeMap<String, ProviderUsage>,
}

/// Lock-free accumulator updated by the geocoding service.
#[derive(Debug, Default)]
pub struct StatsCollector {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    store_hits: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    providers: DashMap<String, ProviderCounters>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a provider show up in snapshots before it is first used.
    pub fn register_provider(&self, name: &str) {
        self.providers.entry(name.to_string()).or_default();
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_hit(&self) {
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A lookup produced an address from a provider.
    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// A lookup ended without an address.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_request(&self, name: &str) {
        self.providers
            .entry(name.to_string())
            .or_default()
            .requests
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_success(&self, name: &str) {
        self.providers
            .entry(name.to_string())
            .or_default()
            .successes
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self, name: &str) {
        self.providers
            .entry(name.to_string())
            .or_default()
            .failures
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_no_result(&self, name: &str) {
        self.providers
            .entry(name.to_string())
            .or_default()
            .no_results
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn provider_usage(&self, name: &str) -> ProviderUsage {
        self.providers
            .get(name)
            .map(|c| c.snapshot())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, cache_size: usize) -> Stats {
        Stats {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            successful_geocodes: self.successes.load(Ordering::Relaxed),
            failed_geocodes: self.failures.load(Ordering::Relaxed),
            cache_size,
            per_provider: self
                .providers
                .iter()
                .map(|e| (e.key().clone(), e.value().snapshot()))
                .collect(),
        }
    }

    /// Zero every counter; registered providers stay listed.
    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.store_hits.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        for entry in self.providers.iter() {
            entry.value().reset();
        }
    }
}
