//! Provider Catalog
//!
//! Priority-ordered, read-only list of the providers available to the
//! geocoding service.

use crate::config::Config;
use crate::domain::entities::{Provider, ProviderConfig};
use crate::domain::ports::ReverseGeocoder;
use crate::domain::value_objects::ProviderKind;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Credentials handed to a capability factory.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub user_agent: String,
    pub api_key: Option<String>,
}

type GeocoderFactory = Box<dyn Fn(&ProviderCredentials) -> Arc<dyn ReverseGeocoder> + Send + Sync>;

/// Maps each built-in provider kind to the code that builds its capability.
///
/// The surrounding application registers one factory per provider it has an
/// integration for; kinds without a factory are left out of the catalog.
#[derive(Default)]
pub struct CapabilityRegistry {
    factories: HashMap<ProviderKind, GeocoderFactory>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for a provider kind.
    pub fn register<F>(mut self, kind: ProviderKind, factory: F) -> Self
    where
        F: Fn(&ProviderCredentials) -> Arc<dyn ReverseGeocoder> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
        self
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.factories.contains_key(&kind)
    }

    fn build(&self, kind: ProviderKind, credentials: &ProviderCredentials) -> Option<Arc<dyn ReverseGeocoder>> {
        self.factories.get(&kind).map(|f| f(credentials))
    }
}

/// Providers sorted ascending by priority.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    providers: Vec<Provider>,
}

impl ProviderCatalog {
    /// Build a catalog from explicit providers.
    ///
    /// Sorting is stable, so providers with equal priority keep their
    /// given order. A provider whose name is already taken is dropped.
    pub fn new(mut providers: Vec<Provider>) -> Self {
        providers.sort_by_key(|p| p.config.priority);

        let mut seen = HashSet::new();
        providers.retain(|p| {
            let fresh = seen.insert(p.config.name.clone());
            if !fresh {
                tracing::warn!("ignoring duplicate geocoding provider {}", p.config.name);
            }
            fresh
        });

        Self { providers }
    }

    /// Build a catalog of the built-in providers.
    ///
    /// Free providers are included whenever a capability is registered for
    /// them; keyed providers additionally need an API key in `config`.
    pub fn from_config(config: &Config, registry: &CapabilityRegistry) -> Self {
        let mut providers = Vec::new();

        for kind in ProviderKind::ALL {
            let api_key = config.api_key(kind).map(str::to_string);

            if kind.requires_api_key() && api_key.is_none() {
                tracing::debug!("skipping {}: no API key configured", kind);
                continue;
            }

            let credentials = ProviderCredentials {
                user_agent: config.user_agent.clone(),
                api_key,
            };

            match registry.build(kind, &credentials) {
                Some(geocoder) => providers.push(Provider::new(ProviderConfig::for_kind(kind), geocoder)),
                None => tracing::debug!("skipping {}: no capability registered", kind),
            }
        }

        let catalog = Self::new(providers);
        tracing::info!(
            "initialized {} geocoding providers: {:?}",
            catalog.len(),
            catalog.names()
        );
        catalog
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.config.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl IntoIterator for ProviderCatalog {
    type Item = Provider;
    type IntoIter = std::vec::IntoIter<Provider>;

    fn into_iter(self) -> Self::IntoIter {
        self.providers.into_iter()
    }
}
