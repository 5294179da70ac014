//! Address Store Port
//!
//! Look-aside persistent cache owned by the surrounding application.

use crate::domain::value_objects::Coordinates;
use async_trait::async_trait;

/// Long-lived address cache (typically a SQL table).
///
/// The orchestrator consults it after an in-memory miss and writes to it
/// after a provider success. Failures are reported as strings and only
/// logged; the store is never required for a lookup to succeed.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Look up a previously stored address.
    async fn get(&self, coords: Coordinates) -> Result<Option<String>, String>;

    /// Store a freshly resolved address.
    async fn put(&self, coords: Coordinates, address: &str) -> Result<(), String>;
}
