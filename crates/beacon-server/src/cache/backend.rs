//! Backend capability shared by every distributed cache implementation.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Field map stored under a single cache key.
pub type FieldMap = HashMap<String, String>;

/// Failures raised by a distributed cache backend.
///
/// These never escape [`DynamicCache`](super::DynamicCache); they only decide
/// whether a single call falls back to the in-process cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection unavailable: {0}")]
    Pool(String),

    #[error("cache command failed: {0}")]
    Command(String),
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        CacheError::Pool(e.to_string())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Command(e.to_string())
    }
}

/// Key to field-map store with per-key TTL, reachable over the network.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Returns every field stored under `key`; a missing key yields an empty map.
    async fn get_map(&self, key: &str) -> Result<FieldMap, CacheError>;

    /// Replaces the whole map under `key` and resets its expiry.
    async fn put_map(&self, key: &str, fields: &FieldMap, ttl: Duration) -> Result<(), CacheError>;

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, CacheError>;

    /// Sets one field, keeping the others, and resets the key's expiry.
    async fn put_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Cheap existence check, also used as the availability probe.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Backend name for logs and status output.
    fn name(&self) -> &'static str;
}

/// Backend a [`DynamicCache`](super::DynamicCache) call is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    Distributed,
    Local,
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Distributed => "distributed",
            CacheMode::Local => "local",
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_mode_names() {
        assert_eq!(CacheMode::Distributed.as_str(), "distributed");
        assert_eq!(CacheMode::Local.to_string(), "local");
        assert_eq!(
            serde_json::to_string(&CacheMode::Distributed).unwrap(),
            "\"distributed\""
        );
    }
}
