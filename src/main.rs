//! Weather Gateway - HTTP weather lookups behind a read-through cache
//!
//! Loads configuration, connects the cache store and weather provider, and
//! serves the HTTP API until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use weather_gateway::cli::Cli;
use weather_gateway::{
    router, AppState, CacheStore, GatewayConfig, MemoryStore, RedisStore, Resolver,
    VisualCrossingClient,
};

/// Installs the global tracing subscriber, honouring `RUST_LOG`
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Picks the cache store: Redis when a URL is configured, memory otherwise
fn build_store(config: &GatewayConfig) -> Result<Arc<dyn CacheStore>, Box<dyn std::error::Error>> {
    match &config.redis_url {
        Some(url) => {
            tracing::info!("Using Redis cache store");
            Ok(Arc::new(RedisStore::new(url)?))
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-memory cache store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.apply(GatewayConfig::load()?);

    let store = build_store(&config)?;
    let origin = VisualCrossingClient::new(
        &config.base_url,
        config.api_key.clone(),
        config.origin_timeout,
    )?
    .with_retry(config.retry);
    let resolver = Resolver::new(store, Arc::new(origin)).with_ttl(config.cache_ttl);
    let app = router(AppState::new(resolver), config.rate_limit);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Starting weather gateway");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
