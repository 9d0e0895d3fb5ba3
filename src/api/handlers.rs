//! API Handlers
//!
//! CRUD handlers for the Configuration resource plus cache diagnostics.
//! Repository failures map to HTTP statuses through `DataError`'s
//! `IntoResponse` implementation.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::DataCache;
use crate::config::Config;
use crate::error::{DataError, Result};
use crate::gateway::DocumentGateway;
use crate::models::{
    Configuration, DeleteResponse, HealthResponse, IdQuery, StatsResponse,
    CONFIGURATION_COLLECTION,
};
use crate::repository::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache instance
    pub cache: Arc<DataCache>,
    /// Repository for the Configuration collection
    pub configs: Arc<Repository<Configuration>>,
}

impl AppState {
    /// Creates a new AppState over an existing cache and gateway.
    pub fn new(cache: Arc<DataCache>, gateway: Arc<dyn DocumentGateway>, cache_enabled: bool) -> Self {
        let configs = Repository::new(CONFIGURATION_COLLECTION, cache.clone(), gateway)
            .with_cache(cache_enabled);
        Self {
            cache,
            configs: Arc::new(configs),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the cache with the configured TTL and opens the gateway named by
    /// the connection string.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = Arc::new(DataCache::new(config.cache_ttl()));
        let gateway = crate::gateway::open_gateway(config)?;
        Ok(Self::new(cache, gateway, config.cache_enabled))
    }
}

/// Handler for GET /api/config
///
/// Returns every configuration, or the one named by `?id=`.
pub async fn get_config_handler(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Response> {
    if let Some(id) = query.id() {
        let config = state.configs.get_by_id(id, None, false).await?;
        return Ok(Json(config).into_response());
    }

    let configs = state.configs.get_all(None).await?;
    if configs.is_empty() {
        warn!("No documents found in collection \"{}\"", state.configs.collection());
    }
    Ok(Json(configs).into_response())
}

/// Handler for POST /api/config
pub async fn create_config_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Configuration>> {
    let created = state.configs.create(&body).await?;
    info!("Created configuration \"{}\"", created.id);
    Ok(Json(created))
}

/// Handler for PUT /api/config
pub async fn update_config_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Configuration>> {
    let updated = state.configs.update(&body, None).await?;
    info!("Updated configuration \"{}\"", updated.id);
    Ok(Json(updated))
}

/// Handler for DELETE /api/config?id=...
pub async fn delete_config_handler(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<DeleteResponse>> {
    let id = query
        .id()
        .ok_or_else(|| DataError::InvalidDocument("missing id parameter".to_string()))?;

    info!("Deleting configuration \"{}\"", id);
    let deleted = state.configs.delete_by_id(id).await?;
    Ok(Json(DeleteResponse::new(id, deleted)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats().await;
    Json(StatsResponse::new(&stats))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
