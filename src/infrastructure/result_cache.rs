//! Result Cache
//!
//! Bounded, time-expiring in-process cache of resolved addresses.

use crate::domain::entities::CacheEntry;
use crate::domain::ports::Clock;
use crate::domain::value_objects::{CacheKey, Coordinates};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Result cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Maximum number of entries (0 disables caching)
    pub max_entries: usize,
    /// Entries older than this are treated as misses
    pub ttl: Duration,
    /// Decimal places kept when rounding coordinates into keys
    pub precision: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl: Duration::from_secs(24 * 60 * 60),
            precision: 4,
        }
    }
}

/// Coordinate-keyed address cache.
///
/// Expired entries are dropped lazily when read. When full, inserting a new
/// key evicts the entry with the oldest creation time; reads do not refresh
/// an entry's position. All access goes through a single lock.
pub struct ResultCache {
    settings: CacheSettings,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn key(&self, coords: Coordinates) -> CacheKey {
        CacheKey::new(coords, self.settings.precision)
    }

    /// Look up an address, purging the entry if it has expired.
    pub fn get(&self, coords: Coordinates) -> Option<String> {
        let key = self.key(coords);
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(&key) {
            Some(entry) if !entry.is_expired(now, self.settings.ttl) => Some(entry.address.clone()),
            Some(_) => {
                entries.remove(&key);
                tracing::debug!("cache entry for {} expired", coords);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite an address.
    pub fn put(&self, coords: Coordinates, address: impl Into<String>) {
        if self.settings.max_entries == 0 {
            return;
        }

        let key = self.key(coords);
        let entry = CacheEntry::new(address.into(), self.clock.now());
        let mut entries = self.entries.lock();

        if !entries.contains_key(&key) && entries.len() >= self.settings.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                tracing::debug!("cache full, evicted oldest entry");
            }
        }

        entries.insert(key, entry);
    }

    /// Remove every expired entry now instead of waiting for reads.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = self.settings.ttl;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now, ttl));
        before - entries.len()
    }

    /// Remove everything and return how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
