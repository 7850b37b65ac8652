//! Read-through resolution of weather queries
//!
//! `Resolver::resolve` checks the cache store first and only calls the weather
//! provider on a miss, populating the cache with the fresh document before
//! returning it. Cache faults degrade to a miss and are counted so repeated
//! outages stay visible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::cache::CacheStore;
use crate::data::{OriginError, WeatherOrigin, WeatherQueryResult};

/// How long a fetched document stays in the cache (12 hours)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(43_200);

/// Errors returned by `Resolver::resolve`
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The city identifier was missing or empty
    #[error("City parameter is required")]
    InvalidInput,

    /// The weather provider could not supply the document
    #[error("origin fetch failed: {0}")]
    Origin(#[from] OriginError),
}

/// Cache-aside resolver over a cache store and a weather origin
pub struct Resolver {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn WeatherOrigin>,
    ttl: Duration,
    cache_faults: AtomicU64,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("ttl", &self.ttl)
            .field("cache_faults", &self.cache_faults())
            .finish()
    }
}

impl Resolver {
    /// Creates a resolver that caches documents for `DEFAULT_CACHE_TTL`
    pub fn new(store: Arc<dyn CacheStore>, origin: Arc<dyn WeatherOrigin>) -> Self {
        Self {
            store,
            origin,
            ttl: DEFAULT_CACHE_TTL,
            cache_faults: AtomicU64::new(0),
        }
    }

    /// Overrides the cache TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of cache reads or writes that failed since startup
    pub fn cache_faults(&self) -> u64 {
        self.cache_faults.load(Ordering::Relaxed)
    }

    /// The underlying cache store
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Resolves weather for `city`, from cache when fresh, otherwise from the origin
    pub async fn resolve(&self, city: Option<&str>) -> Result<WeatherQueryResult, ResolverError> {
        let city = match city {
            Some(c) if !c.is_empty() => c,
            _ => return Err(ResolverError::InvalidInput),
        };

        if let Some(data) = self.read_cache(city).await {
            tracing::debug!(city, "Cache hit");
            return Ok(WeatherQueryResult::from_cache(data));
        }

        tracing::debug!(city, "Cache miss, fetching from origin");
        let data = self.origin.fetch(city).await.map_err(|e| {
            tracing::warn!(city, status = ?e.status(), error = %e, "Origin fetch failed");
            e
        })?;

        self.write_cache(city, &data).await;
        Ok(WeatherQueryResult::from_origin(data))
    }

    /// Reads and decodes a cached document; any failure is reported as a miss
    async fn read_cache(&self, city: &str) -> Option<Value> {
        let raw = match self.store.get(city).await {
            Ok(raw) => raw?,
            Err(e) => {
                let faults = self.record_fault();
                tracing::warn!(city, faults, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(city, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Stores a fetched document; failures are logged and otherwise ignored
    async fn write_cache(&self, city: &str, data: &Value) {
        let payload = match serde_json::to_string(data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(city, error = %e, "Failed to serialize weather document");
                return;
            }
        };

        if let Err(e) = self.store.set(city, &payload, self.ttl).await {
            let faults = self.record_fault();
            tracing::warn!(city, faults, error = %e, "Cache write failed");
        }
    }

    fn record_fault(&self) -> u64 {
        self.cache_faults.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Store wrapper that counts calls and can be switched into a failing mode
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        gets: AtomicUsize,
        sets: Mutex<Vec<(String, String, Duration)>>,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl RecordingStore {
        fn set_count(&self) -> usize {
            self.sets.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return Err(CacheError::Unavailable("connection refused".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
            self.sets
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string(), ttl));
            if self.fail_writes {
                return Err(CacheError::Unavailable("connection refused".to_string()));
            }
            self.inner.set(key, value, ttl).await
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    /// Origin that returns a fixed response and counts calls
    struct StubOrigin {
        response: Result<Value, u16>,
        calls: AtomicUsize,
    }

    impl StubOrigin {
        fn ok(data: Value) -> Self {
            Self {
                response: Ok(data),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                response: Err(status),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherOrigin for StubOrigin {
        async fn fetch(&self, _city: &str) -> Result<Value, OriginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(data) => Ok(data.clone()),
                Err(status) => Err(OriginError::Status { status: *status }),
            }
        }
    }

    fn paris_document() -> Value {
        json!({
            "resolvedAddress": "Paris, Île-de-France, France",
            "timezone": "Europe/Paris",
            "days": [{"datetime": "2024-07-15", "tempmax": 28.4, "tempmin": 17.1}]
        })
    }

    fn resolver(store: &Arc<RecordingStore>, origin: &Arc<StubOrigin>) -> Resolver {
        Resolver::new(store.clone(), origin.clone())
    }

    #[tokio::test]
    async fn test_empty_city_rejected_before_any_io() {
        let store = Arc::new(RecordingStore::default());
        let origin = Arc::new(StubOrigin::ok(paris_document()));
        let resolver = resolver(&store, &origin);

        for city in [None, Some("")] {
            let result = resolver.resolve(city).await;
            assert!(matches!(result, Err(ResolverError::InvalidInput)));
        }

        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
        assert_eq!(store.set_count(), 0);
        assert_eq!(origin.calls(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_city_is_forwarded_verbatim() {
        let store = Arc::new(RecordingStore::default());
        let origin = Arc::new(StubOrigin::ok(paris_document()));
        let resolver = resolver(&store, &origin);

        let result = resolver.resolve(Some("   ")).await.unwrap();

        assert_eq!(result, WeatherQueryResult::from_origin(paris_document()));
        assert_eq!(origin.calls(), 1);
        assert_eq!(store.sets.lock().unwrap()[0].0, "   ");
    }

    #[tokio::test]
    async fn test_miss_fetches_once_and_caches_with_ttl() {
        let store = Arc::new(RecordingStore::default());
        let origin = Arc::new(StubOrigin::ok(paris_document()));
        let resolver = resolver(&store, &origin);

        let result = resolver.resolve(Some("Paris")).await.unwrap();

        assert_eq!(result, WeatherQueryResult::from_origin(paris_document()));
        assert_eq!(origin.calls(), 1);
        let sets = store.sets.lock().unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, "Paris");
        assert_eq!(sets[0].2, Duration::from_secs(43_200));
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_origin_call() {
        let store = Arc::new(RecordingStore::default());
        let origin = Arc::new(StubOrigin::ok(paris_document()));
        let resolver = resolver(&store, &origin);

        resolver.resolve(Some("Paris")).await.unwrap();
        let second = resolver.resolve(Some("Paris")).await.unwrap();

        assert_eq!(second, WeatherQueryResult::from_cache(paris_document()));
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_origin_failure_writes_nothing() {
        let store = Arc::new(RecordingStore::default());
        let origin = Arc::new(StubOrigin::failing(500));
        let resolver = resolver(&store, &origin);

        let result = resolver.resolve(Some("Paris")).await;

        match result {
            Err(ResolverError::Origin(e)) => assert_eq!(e.status(), Some(500)),
            other => panic!("Expected origin error, got {:?}", other),
        }
        assert_eq!(store.set_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_read_fault_falls_through_to_origin() {
        let store = Arc::new(RecordingStore {
            fail_reads: true,
            ..Default::default()
        });
        let origin = Arc::new(StubOrigin::ok(paris_document()));
        let resolver = resolver(&store, &origin);

        let result = resolver.resolve(Some("Paris")).await.unwrap();

        assert_eq!(result.source, crate::data::Source::Origin);
        assert_eq!(origin.calls(), 1);
        assert_eq!(resolver.cache_faults(), 1);
    }

    #[tokio::test]
    async fn test_cache_write_fault_still_returns_data() {
        let store = Arc::new(RecordingStore {
            fail_writes: true,
            ..Default::default()
        });
        let origin = Arc::new(StubOrigin::ok(paris_document()));
        let resolver = resolver(&store, &origin);

        let result = resolver.resolve(Some("Paris")).await.unwrap();

        assert_eq!(result, WeatherQueryResult::from_origin(paris_document()));
        assert_eq!(resolver.cache_faults(), 1);
    }

    #[tokio::test]
    async fn test_cached_payload_is_only_ever_parsed_as_data() {
        let store = Arc::new(RecordingStore::default());
        let origin = Arc::new(StubOrigin::ok(paris_document()));
        // Text that a code-evaluating cache would have run
        store
            .inner
            .set("Paris", "__import__('os').system('true')", DEFAULT_CACHE_TTL)
            .await
            .unwrap();
        let resolver = resolver(&store, &origin);

        let result = resolver.resolve(Some("Paris")).await.unwrap();

        assert_eq!(result.source, crate::data::Source::Origin);
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_document_round_trips_exactly() {
        let store = Arc::new(RecordingStore::default());
        let document = json!({
            "quote": "it's \"sunny\"",
            "nested": {"list": [1, 2.5, null, true], "unicode": "Zürich"},
            "big": 9_007_199_254_740_993u64
        });
        let origin = Arc::new(StubOrigin::ok(document.clone()));
        let resolver = resolver(&store, &origin);

        resolver.resolve(Some("Zürich")).await.unwrap();
        let cached = resolver.resolve(Some("Zürich")).await.unwrap();

        assert_eq!(cached, WeatherQueryResult::from_cache(document));
    }

    #[tokio::test]
    async fn test_custom_ttl_is_used_for_writes() {
        let store = Arc::new(RecordingStore::default());
        let origin = Arc::new(StubOrigin::ok(paris_document()));
        let resolver = resolver(&store, &origin).with_ttl(Duration::from_secs(60));

        resolver.resolve(Some("Paris")).await.unwrap();

        assert_eq!(store.sets.lock().unwrap()[0].2, Duration::from_secs(60));
    }
}
