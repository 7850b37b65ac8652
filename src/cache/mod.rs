//! Cache store for weather payloads
//!
//! This module defines the `CacheStore` trait used by the resolver, along with
//! two implementations: a Redis-backed store for deployments and an in-process
//! store with an injectable clock. Payloads are stored as serialized JSON text
//! and are only ever decoded with a structured parser.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{Clock, ManualClock, MemoryStore, SystemClock};
pub use redis::RedisStore;

/// Errors raised by a cache store
///
/// A missing key is never an error; `get` reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store could not be reached (connection refused, pool timeout, ...)
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the command
    #[error("cache command failed: {0}")]
    Command(String),
}

/// Time-bounded key-value storage for serialized weather payloads
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored payload if present and not expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any existing entry, expiring after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Checks that the store is reachable
    async fn ping(&self) -> Result<(), CacheError>;
}
