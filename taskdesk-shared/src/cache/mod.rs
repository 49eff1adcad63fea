/// Read-through cache and per-status counters
///
/// The cache is never authoritative. Services treat every cache failure as a
/// miss (reads) or log and carry on (writes); nothing in this module is allowed
/// to fail a request.
///
/// # Key layout
///
/// ```text
/// task:<id>                       JSON TaskDetail, 1h
/// user:<id>                       JSON User, 1h
/// user_tasks:<user_id>            invalidation marker for list views
/// task_count:<user_id>:<status>   integer counter, 24h
/// ```
///
/// Implementations:
///
/// - [`redis::RedisCache`]: production cache over a Redis `ConnectionManager`
/// - [`crate::memory::MemoryCache`]: an in-process cache for tests

pub mod keys;
pub mod redis;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache command error: {0}")]
    Command(String),

    #[error("Cache configuration error: {0}")]
    Config(String),

    #[error("Cache command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache value could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value cache with TTLs and atomic counters
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Atomically adds `delta` and resets the TTL; a missing key starts at 0
    async fn increment(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64>;

    /// Atomically subtracts `delta`, clamping at 0, and resets the TTL
    ///
    /// A missing key is left missing and reported as 0, so the next read
    /// recounts from the store instead of trusting a made-up value.
    async fn decrement(&self, key: &str, delta: i64, ttl: Duration) -> CacheResult<i64>;

    async fn ping(&self) -> CacheResult<()>;
}

/// Reads and decodes a JSON value
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> CacheResult<Option<T>> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encodes and stores a JSON value
pub async fn set_json<T: Serialize + Sync + ?Sized>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> CacheResult<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, raw, ttl).await
}

/// Reads an integer counter
pub async fn get_counter(cache: &dyn Cache, key: &str) -> CacheResult<Option<i64>> {
    match cache.get(key).await? {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CacheError::Command(format!("counter {key} holds non-integer {raw:?}"))),
        None => Ok(None),
    }
}

/// TTLs for each kind of cache entry, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub task_ttl_secs: u64,
    pub user_ttl_secs: u64,
    pub counter_ttl_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            task_ttl_secs: 3600,
            user_ttl_secs: 3600,
            counter_ttl_secs: 86400,
        }
    }
}

impl CacheTtls {
    pub fn task(&self) -> Duration {
        Duration::from_secs(self.task_ttl_secs)
    }

    pub fn user(&self) -> Duration {
        Duration::from_secs(self.user_ttl_secs)
    }

    pub fn counter(&self) -> Duration {
        Duration::from_secs(self.counter_ttl_secs)
    }
}
