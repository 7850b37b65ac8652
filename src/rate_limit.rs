//! Per-client rate limiting middleware
//!
//! Each client address gets an hourly and a daily quota; a request must fit
//! within both. Rejected requests get 429 with a `Retry-After` header.
//!
//! Clients are identified by the connecting peer address. Forwarding headers
//! are only consulted when `trust_proxy_headers` is set, for deployments where
//! a reverse proxy in front of the gateway overwrites them.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{clock::Clock, clock::DefaultClock, DefaultKeyedRateLimiter};
use governor::{Quota, RateLimiter};

use crate::error::ApiError;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Idle client state is swept after this many checks
const RETAIN_EVERY: u64 = 1024;

/// Request quotas applied to each client address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_hour: u32,
    pub per_day: u32,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_hour: 50,
            per_day: 200,
            trust_proxy_headers: false,
        }
    }
}

/// Builds a quota that admits `count` requests per `window`, all available as a burst
fn quota(count: u32, window: Duration) -> Quota {
    let count = NonZeroU32::new(count).unwrap_or(NonZeroU32::MIN);
    let period = window / count.get();
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(count))
        .allow_burst(count)
}

/// Shared state for the rate limiting middleware
#[derive(Clone)]
pub struct RateLimitState {
    config: RateLimitConfig,
    hourly: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    daily: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    checks: Arc<AtomicU64>,
    clock: DefaultClock,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            hourly: Arc::new(RateLimiter::keyed(quota(config.per_hour, HOUR))),
            daily: Arc::new(RateLimiter::keyed(quota(config.per_day, DAY))),
            checks: Arc::new(AtomicU64::new(0)),
            clock: DefaultClock::default(),
        }
    }

    /// Number of client addresses currently holding limiter state
    pub fn tracked_clients(&self) -> usize {
        self.daily.len().max(self.hourly.len())
    }

    /// Admits one request from `ip`, or returns how long until it would be admitted
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % RETAIN_EVERY == RETAIN_EVERY - 1 {
            self.daily.retain_recent();
            self.hourly.retain_recent();
        }

        let now = self.clock.now();
        for limiter in [&self.daily, &self.hourly] {
            if let Err(not_until) = limiter.check_key(&ip) {
                return Err(not_until.wait_time_from(now));
            }
        }
        Ok(())
    }
}

/// Error returned when a client is over quota
pub struct RateLimitError {
    /// Seconds until the client may retry
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut response = ApiError::RATE_LIMITED.into_response();
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Address of the connecting peer, or the unspecified address when unknown
fn peer_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Extract client IP from request, considering proxy headers only when trusted
fn extract_client_ip(request: &Request, trust_proxy_headers: bool) -> IpAddr {
    if !trust_proxy_headers {
        return peer_ip(request);
    }

    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        // X-Forwarded-For can contain multiple IPs, take the first one
        if let Some(first_ip) = forwarded_for.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse() {
                return ip;
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        if let Ok(ip) = real_ip.trim().parse() {
            return ip;
        }
    }

    peer_ip(request)
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let ip = extract_client_ip(&request, state.config.trust_proxy_headers);

    match state.check(ip) {
        Ok(()) => Ok(next.run(request).await),
        Err(wait) => {
            let retry_after = wait.as_secs().max(1);
            tracing::info!(%ip, retry_after, "Rate limit exceeded");
            Err(RateLimitError { retry_after })
        }
    }
}
