use crate::application::ResolveSettings;
use crate::domain::value_objects::ProviderKind;
use crate::infrastructure::CacheSettings;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Provider settings
    pub user_agent: String,
    pub google_api_key: Option<String>,
    pub mapbox_api_key: Option<String>,
    pub here_api_key: Option<String>,

    // Cache settings
    pub cache_size: usize,
    pub cache_hours: u64,
    pub cache_precision: u32,

    // Resolve settings
    pub max_providers: Option<usize>,
    pub resolve_deadline_secs: Option<u64>,

    // Status API settings
    pub api_listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: "revgeo-location-tracker".to_string(),
            google_api_key: None,
            mapbox_api_key: None,
            here_api_key: None,
            cache_size: 1000,
            cache_hours: 24,
            cache_precision: 4,
            max_providers: None,
            resolve_deadline_secs: None,
            api_listen_addr: "0.0.0.0:8090".to_string(),
        }
    }
}

impl Config {
    /// Configured API key for a provider, if any.
    pub fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::GoogleV3 => self.google_api_key.as_deref(),
            ProviderKind::MapBox => self.mapbox_api_key.as_deref(),
            ProviderKind::HereV7 => self.here_api_key.as_deref(),
            ProviderKind::Nominatim | ProviderKind::Photon | ProviderKind::ArcGis => None,
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_entries: self.cache_size,
            ttl: Duration::from_secs(self.cache_hours.saturating_mul(3600)),
            precision: self.cache_precision,
        }
    }

    pub fn resolve_settings(&self) -> ResolveSettings {
        ResolveSettings {
            max_providers: self.max_providers,
            deadline: self.resolve_deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Non-empty, trimmed value of an environment variable.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn load_config() -> anyhow::Result<Config> {
    let user_agent = std::env::var("REVGEO_USER_AGENT")
        .unwrap_or_else(|_| "revgeo-location-tracker".to_string());

    let google_api_key = non_empty_var("GOOGLE_GEOCODING_API_KEY");
    let mapbox_api_key = non_empty_var("MAPBOX_API_KEY");
    let here_api_key = non_empty_var("HERE_API_KEY");

    let cache_size = std::env::var("GEOCODING_CACHE_SIZE")
        .unwrap_or_else(|_| "1000".to_string())
        .parse()
        .unwrap_or(1000);

    let cache_hours = std::env::var("GEOCODING_CACHE_HOURS")
        .unwrap_or_else(|_| "24".to_string())
        .parse()
        .unwrap_or(24);

    let cache_precision = std::env::var("GEOCODING_CACHE_PRECISION")
        .unwrap_or_else(|_| "4".to_string())
        .parse()
        .unwrap_or(4);

    // Unset or 0 means try every provider
    let max_providers = std::env::var("GEOCODING_MAX_PROVIDERS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|n: &usize| *n > 0);

    let resolve_deadline_secs = std::env::var("GEOCODING_RESOLVE_DEADLINE_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|n: &u64| *n > 0);

    let api_listen_addr = std::env::var("REVGEO_API_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8090".to_string());

    Ok(Config {
        user_agent,
        google_api_key,
        mapbox_api_key,
        here_api_key,
        cache_size,
        cache_hours,
        cache_precision,
        max_providers,
        resolve_deadline_secs,
        api_listen_addr,
    })
}
