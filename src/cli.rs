//! Command-line interface parsing for the weather gateway
//!
//! Flags override values loaded from the environment.

use std::net::SocketAddr;

use clap::Parser;

use crate::config::GatewayConfig;

/// Weather gateway - serve city weather through a read-through cache
#[derive(Parser, Debug)]
#[command(name = "weather-gateway")]
#[command(about = "HTTP gateway for city weather with a 12-hour read-through cache")]
#[command(version)]
pub struct Cli {
    /// Address to listen on (overrides BIND_ADDR)
    ///
    /// Example: weather-gateway --bind 0.0.0.0:8080
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Redis URL for the cache store (overrides REDIS_URL)
    #[arg(long, value_name = "URL")]
    pub redis_url: Option<String>,

    /// Disable per-client rate limiting
    #[arg(long)]
    pub no_rate_limit: bool,
}

impl Cli {
    /// Applies command-line overrides on top of `config`
    pub fn apply(&self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(url) = &self.redis_url {
            config.redis_url = Some(url.clone());
        }
        if self.no_rate_limit {
            config.rate_limit = None;
        }
        config
    }
}
