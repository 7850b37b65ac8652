//! Core data models for the weather gateway
//!
//! This module contains the query result returned to callers and the client
//! for the upstream weather provider.

pub mod weather;

pub use weather::{OriginError, RetryPolicy, VisualCrossingClient, WeatherOrigin};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a query result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    /// Served from the cache store
    #[serde(rename = "cache")]
    Cache,
    /// Fetched from the upstream weather provider
    #[serde(rename = "API")]
    Origin,
}

/// Weather data for a city, tagged with its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherQueryResult {
    pub source: Source,
    /// The provider's weather document, passed through as-is
    pub data: Value,
}

impl WeatherQueryResult {
    pub fn from_cache(data: Value) -> Self {
        Self {
            source: Source::Cache,
            data,
        }
    }

    pub fn from_origin(data: Value) -> Self {
        Self {
            source: Source::Origin,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_serializes_to_wire_names() {
        assert_eq!(serde_json::to_value(Source::Cache).unwrap(), json!("cache"));
        assert_eq!(serde_json::to_value(Source::Origin).unwrap(), json!("API"));
    }

    #[test]
    fn test_query_result_shape() {
        let result = WeatherQueryResult::from_origin(json!({"resolvedAddress": "Paris"}));

        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(
            value,
            json!({"source": "API", "data": {"resolvedAddress": "Paris"}})
        );
    }
}
