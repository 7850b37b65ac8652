//! Weather Gateway Library
//!
//! Serves city weather over HTTP, answering from a time-bounded cache and
//! falling back to the upstream provider on a miss.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod rate_limit;
pub mod resolver;
pub mod server;

pub use cache::{CacheError, CacheStore, MemoryStore, RedisStore};
pub use config::{ConfigError, GatewayConfig};
pub use data::{Source, VisualCrossingClient, WeatherOrigin, WeatherQueryResult};
pub use resolver::{Resolver, ResolverError};
pub use server::{router, AppState};
