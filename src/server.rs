//! HTTP routes for the weather gateway
//!
//! Builds the axum `Router` serving `/`, `/weather` and `/health`.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::data::WeatherQueryResult;
use crate::error::ApiError;
use crate::rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimitState};
use crate::resolver::Resolver;

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

impl AppState {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

/// Body of `/health`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub cache: String,
    pub cache_faults: u64,
}

/// Builds the gateway router, with rate limiting when `rate_limit` is set
pub fn router(state: AppState, rate_limit: Option<RateLimitConfig>) -> Router {
    let mut weather = Router::new().route("/weather", get(weather_handler));
    if let Some(config) = rate_limit {
        weather = weather.layer(middleware::from_fn_with_state(
            RateLimitState::new(config),
            rate_limit_middleware,
        ));
    }

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .merge(weather)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Json<Value> {
    Json(json!({"message": "Welcome to the Weather API!"}))
}

/// First `city` value in the query string, if any
fn first_city(pairs: Vec<(String, String)>) -> Option<String> {
    pairs
        .into_iter()
        .find(|(name, _)| name == "city")
        .map(|(_, value)| value)
}

async fn weather_handler(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<WeatherQueryResult>, ApiError> {
    let city = match query {
        Ok(Query(pairs)) => first_city(pairs),
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable query string");
            None
        }
    };
    let result = state.resolver.resolve(city.as_deref()).await?;
    Ok(Json(result))
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let cache = match state.resolver.store().ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "Cache store ping failed");
            "down"
        }
    };
    Json(HealthStatus {
        status: "ok".to_string(),
        cache: cache.to_string(),
        cache_faults: state.resolver.cache_faults(),
    })
}
