//! External response cache.
//!
//! # Data Flow
//! ```text
//! StaticHandler (cache front)
//!     → CacheClient::get(path)      hit → serve bytes, no filesystem read
//!                                   miss / error → file server
//!     → CacheClient::set(path, body, ttl) after a captured 200
//! ```
//!
//! # Design Decisions
//! - The handler only sees the `CacheClient` trait; memcached is one adapter
//! - Every failure is a `CacheError` the caller logs and degrades on
//! - Values are raw bodies; headers are not stored

pub mod memcache;

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;

pub use memcache::MemcacheClient;

/// Transient cache failure. Never surfaced to clients.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache protocol error: {0}")]
    Protocol(String),

    #[error("cache operation timed out")]
    Timeout,

    #[error("key is not a legal cache key")]
    MalformedKey,

    #[error("value of {size} bytes exceeds the {limit} byte item limit")]
    TooLarge { size: usize, limit: usize },
}

/// Narrow capability surface over a key/value cache.
///
/// Implementations must be safe for concurrent calls.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Look up `key`. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `value` under `key` for `ttl_secs` seconds; `<= 0` never expires.
    async fn set(&self, key: &str, value: Bytes, ttl_secs: i32) -> Result<(), CacheError>;
}
