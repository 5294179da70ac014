//! DashMap Address Store
//!
//! Implements AddressStore in memory using DashMap for lock-free concurrent
//! access. Useful when the host application has no database, and in tests.

use crate::domain::ports::AddressStore;
use crate::domain::value_objects::{CacheKey, Coordinates};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// DashMap-backed address store.
///
/// Entries never expire; coordinates are bucketed at `precision` decimal
/// places, like the result cache.
pub struct DashMapAddressStore {
    addresses: Arc<DashMap<CacheKey, String>>,
    precision: u32,
}

impl DashMapAddressStore {
    /// Create a store that buckets coordinates at `precision` decimals.
    pub fn new(precision: u32) -> Self {
        Self {
            addresses: Arc::new(DashMap::new()),
            precision,
        }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    fn key(&self, coords: Coordinates) -> CacheKey {
        CacheKey::new(coords, self.precision)
    }
}

impl Default for DashMapAddressStore {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl AddressStore for DashMapAddressStore {
    async fn get(&self, coords: Coordinates) -> Result<Option<String>, String> {
        Ok(self.addresses.get(&self.key(coords)).map(|e| e.value().clone()))
    }

    async fn put(&self, coords: Coordinates, address: &str) -> Result<(), String> {
        self.addresses.insert(self.key(coords), address.to_string());
        Ok(())
    }
}
