//! Gateway configuration loaded from the environment
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file, and can be overridden by command-line flags (see `cli`).

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::data::weather::VISUAL_CROSSING_BASE_URL;
use crate::data::RetryPolicy;
use crate::rate_limit::RateLimitConfig;
use crate::resolver::DEFAULT_CACHE_TTL;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Longest accepted cache TTL (one year)
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set but its value is unusable
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Runtime settings for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Weather provider API key
    pub api_key: String,
    /// Weather provider base URL
    pub base_url: String,
    /// Redis connection URL; the in-memory store is used when absent
    pub redis_url: Option<String>,
    /// How long fetched documents stay cached
    pub cache_ttl: Duration,
    /// Timeout for one provider request
    pub origin_timeout: Duration,
    /// Retry policy for transient provider failures
    pub retry: RetryPolicy,
    /// Per-client request quotas; `None` disables rate limiting
    pub rate_limit: Option<RateLimitConfig>,
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
}

impl GatewayConfig {
    /// Loads `.env` (if any) and then reads the process environment
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        Self::from_env()
    }

    /// Reads configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = var("API_KEY").ok_or(ConfigError::Missing("API_KEY"))?;
        let base_url =
            var("WEATHER_BASE_URL").unwrap_or_else(|| VISUAL_CROSSING_BASE_URL.to_string());
        let redis_url = var("REDIS_URL");

        let cache_ttl = match var("CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("CACHE_TTL_SECS", &raw)?),
            None => DEFAULT_CACHE_TTL,
        };
        if cache_ttl > MAX_CACHE_TTL {
            return Err(ConfigError::Invalid {
                name: "CACHE_TTL_SECS",
                reason: format!("must be at most {}", MAX_CACHE_TTL.as_secs()),
            });
        }
        let origin_timeout = match var("ORIGIN_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("ORIGIN_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(10),
        };

        let mut retry = RetryPolicy::default();
        if let Some(raw) = var("ORIGIN_MAX_RETRIES") {
            retry.max_retries = parse_number("ORIGIN_MAX_RETRIES", &raw)?;
        }

        let mut rate_limit = RateLimitConfig::default();
        if let Some(raw) = var("RATE_LIMIT_PER_HOUR") {
            rate_limit.per_hour = parse_positive("RATE_LIMIT_PER_HOUR", &raw)?;
        }
        if let Some(raw) = var("RATE_LIMIT_PER_DAY") {
            rate_limit.per_day = parse_positive("RATE_LIMIT_PER_DAY", &raw)?;
        }
        if let Some(raw) = var("RATE_LIMIT_TRUST_PROXY") {
            rate_limit.trust_proxy_headers = parse_number("RATE_LIMIT_TRUST_PROXY", &raw)?;
        }

        let bind_raw = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        Ok(Self {
            api_key,
            base_url,
            redis_url,
            cache_ttl,
            origin_timeout,
            retry,
            rate_limit: Some(rate_limit),
            bind_addr,
        })
    }
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_positive<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value: T = parse_number(name, raw)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than 0".to_string(),
        });
    }
    Ok(value)
}
