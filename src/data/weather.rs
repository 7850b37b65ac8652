//! Visual Crossing weather API client
//!
//! This module provides the `WeatherOrigin` trait the resolver calls on a cache
//! miss, and its implementation against the Visual Crossing timeline API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use thiserror::Error;

/// Base URL for the Visual Crossing timeline API
pub const VISUAL_CROSSING_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

/// Errors that can occur when fetching weather data from the provider
#[derive(Debug, Error)]
pub enum OriginError {
    /// Provider answered with a non-success status
    #[error("Provider returned status {status}")]
    Status { status: u16 },

    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Base URL cannot have path segments appended
    #[error("Invalid provider base URL: {0}")]
    InvalidBaseUrl(String),
}

// The request URL carries the API key, so it is stripped before the error is kept
impl From<reqwest::Error> for OriginError {
    fn from(err: reqwest::Error) -> Self {
        OriginError::RequestFailed(err.without_url())
    }
}

impl OriginError {
    /// Upstream status, if the provider answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            OriginError::Status { status } => Some(*status),
            OriginError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether another attempt might succeed
    fn is_transient(&self) -> bool {
        match self {
            OriginError::Status { status } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            OriginError::RequestFailed(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// The authoritative weather source consulted on a cache miss
#[async_trait]
pub trait WeatherOrigin: Send + Sync {
    /// Fetches the weather document for `city`
    async fn fetch(&self, city: &str) -> Result<Value, OriginError>;
}

/// Bounded retry with exponential backoff for transient provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Client for fetching weather data from the Visual Crossing API
#[derive(Debug, Clone)]
pub struct VisualCrossingClient {
    client: Client,
    base_url: Url,
    api_key: String,
    retry: RetryPolicy,
}

impl VisualCrossingClient {
    /// Create a new client with a request timeout and no retries
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OriginError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, base_url, api_key)
    }

    /// Create a new client around a preconfigured HTTP client
    pub fn with_client(
        client: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, OriginError> {
        let base_url =
            Url::parse(base_url).map_err(|e| OriginError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(OriginError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            retry: RetryPolicy::none(),
        })
    }

    /// Set the retry policy for transient failures
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the request URL: `<base>/<city>?key=<key>&unitGroup=metric`
    ///
    /// The city becomes a single percent-encoded path segment.
    pub fn request_url(&self, city: &str) -> Result<Url, OriginError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OriginError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(city);
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("unitGroup", "metric");
        Ok(url)
    }

    async fn fetch_once(&self, url: &Url) -> Result<Value, OriginError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status {
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl WeatherOrigin for VisualCrossingClient {
    async fn fetch(&self, city: &str) -> Result<Value, OriginError> {
        let url = self.request_url(city)?;
        let mut attempt = 0;
        loop {
            match self.fetch_once(&url).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(city, attempt, ?delay, error = %e, "Retrying weather provider");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
