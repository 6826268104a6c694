//! Redis implementation of [`DistributedCache`] over a deadpool connection pool.
//!
//! Each field map is a Redis hash. Writes that touch both the hash and its
//! expiry go out as one `MULTI`/`EXEC` pipeline so a reader never sees a map
//! without a TTL.

use super::backend::{CacheError, DistributedCache, FieldMap};
use crate::config::RedisConfig;
use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds the connection pool. Connections are opened lazily, so this
    /// succeeds even while Redis is down; reachability is the probe's call.
    pub fn from_config(config: &RedisConfig) -> Result<Self, CacheError> {
        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        let timeout = Some(Duration::from_millis(config.timeout_ms));
        pool_config.timeouts.wait = timeout;
        pool_config.timeouts.create = timeout;
        pool_config.timeouts.recycle = timeout;
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| CacheError::Pool(e.to_string()))?;
        Ok(Self::new(pool))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl DistributedCache for RedisCache {
    async fn get_map(&self, key: &str) -> Result<FieldMap, CacheError> {
        let mut conn = self.pool.get().await?;
        let fields: FieldMap = conn.hgetall(key).await?;
        tracing::debug!(key = %key, fields = fields.len(), "redis HGETALL");
        Ok(fields)
    }

    async fn put_map(&self, key: &str, fields: &FieldMap, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !fields.is_empty() {
            let items: Vec<(&str, &str)> = fields
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            pipe.hset_multiple(key, &items)
                .ignore()
                .cmd("PEXPIRE")
                .arg(key)
                .arg(ttl_millis(ttl))
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn put_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let _: () = redis::pipe()
            .atomic()
            .hset(key, field, value)
            .ignore()
            .cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_never_rounds_to_zero() {
        assert_eq!(ttl_millis(Duration::from_secs(1800)), 1_800_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
    }

    #[tokio::test]
    async fn test_pool_creation_does_not_connect() {
        let config = RedisConfig {
            enabled: true,
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 2,
            timeout_ms: 200,
        };
        let cache = RedisCache::from_config(&config).unwrap();

        assert!(cache.exists("anything").await.is_err());
    }
}
