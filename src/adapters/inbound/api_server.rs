//! Status API Server
//!
//! HTTP API exposing lookups, provider health, usage statistics, and the
//! operator overrides of the geocoding service.

use crate::application::{GeocodingService, ProviderStatusReport, Stats};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Query string of a reverse lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub max_providers: Option<usize>,
}

/// Reverse lookup response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReverseResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

/// Health response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: usize,
    pub available_providers: usize,
    pub cache_size: usize,
}

/// Provider list response.
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: BTreeMap<String, ProviderStatusReport>,
    pub total: usize,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<GeocodingService>,
}

impl ApiState {
    pub fn new(service: Arc<GeocodingService>) -> Self {
        Self { service }
    }
}

/// Build the status API routes.
pub fn router(state: ApiState) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(health_handler))
        // Lookups
        .route("/api/v1/geocode/reverse", get(reverse_handler))
        // Provider health
        .route("/api/v1/providers", get(list_providers_handler))
        .route("/api/v1/providers/:name/reset", post(reset_provider_handler))
        .route("/api/v1/providers/:name/disable", post(disable_provider_handler))
        // Usage statistics
        .route("/api/v1/stats", get(stats_handler))
        .route("/api/v1/stats/reset", post(reset_stats_handler))
        // Cache
        .route("/api/v1/cache", delete(clear_cache_handler))
        .with_state(state)
}

/// API Server for the geocoding service.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, service: Arc<GeocodingService>) -> Self {
        Self {
            listen_addr,
            state: ApiState::new(service),
        }
    }

    /// Run the API server.
    ///
    /// The final Ok(()) is excluded from coverage since axum::serve runs forever.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone()).layer(TraceLayer::new_for_http());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("geocoding status API listening on {}", self.listen_addr);

        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Start background task dropping expired cache entries.
    ///
    /// Runs until the returned handle is aborted.
    pub fn start_purge_task(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.state.service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                service.purge_expired_cache();
            }
        })
    }
}

// Handler functions

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let providers = state.service.provider_status();
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: providers.len(),
        available_providers: providers.values().filter(|p| p.available).count(),
        cache_size: state.service.cache_len(),
    };
    Json(response)
}

async fn reverse_handler(
    State(state): State<ApiState>,
    Query(query): Query<ReverseQuery>,
) -> impl IntoResponse {
    let address = state
        .service
        .resolve(query.lat, query.lng, query.max_providers)
        .await;

    let code = if address.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    let response = ReverseResponse {
        latitude: query.lat,
        longitude: query.lng,
        address,
    };
    (code, Json(response))
}

async fn list_providers_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let providers = state.service.provider_status();
    let total = providers.len();
    Json(ProvidersResponse { providers, total })
}

async fn reset_provider_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    if state.service.reset_provider(&name) {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "name": name,
                "status": "healthy"
            })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "name": name,
                "error": "provider not found"
            })),
        )
    }
}

async fn disable_provider_handler(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    if state.service.disable_provider(&name) {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "name": name,
                "status": "unavailable"
            })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "name": name,
                "error": "provider not found"
            })),
        )
    }
}

async fn stats_handler(State(state): State<ApiState>) -> Json<Stats> {
    Json(state.service.stats())
}

async fn reset_stats_handler(State(state): State<ApiState>) -> impl IntoResponse {
    state.service.reset_stats();
    Json(serde_json::json!({ "reset": true }))
}

async fn clear_cache_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let cleared = state.service.clear_cache();
    Json(serde_json::json!({ "cleared": cleared }))
}
