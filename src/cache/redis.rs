//! Redis cache store
//!
//! Stores payloads with `SETEX` so expiry is enforced by Redis itself.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};

use super::{CacheError, CacheStore};

/// Redis-backed cache store with connection pooling
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisStore {
    /// Creates a store for the given connection URL
    ///
    /// The pool connects lazily, so an unreachable server surfaces on the
    /// first command rather than here.
    pub fn new(connection_url: &str) -> Result<Self, CacheError> {
        let pool = PoolConfig::from_url(connection_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable(format!("failed to create Redis pool: {}", e)))?;
        Ok(Self { pool })
    }

    async fn connection(&self) -> Result<Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

/// Sorts a Redis error into a connectivity fault or a rejected command
fn classify(err: redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        CacheError::Unavailable(err.to_string())
    } else {
        CacheError::Command(err.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get(key).await.map_err(classify)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(classify)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}
