//! Integration tests for the Redis policy cache.
//!
//! These tests use testcontainers to spin up a real Redis instance and need
//! a Docker daemon; run them with `--ignored`.

use beacon_server::cache::{
    CacheAvailabilityProbe, DistributedCache, DynamicCache, FieldMap, LocalCache,
};
use beacon_server::{CacheMode, RedisCache, RedisConfig, SystemClock, create_distributed_cache};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

async fn redis_cache() -> RedisCache {
    let config = RedisConfig {
        enabled: true,
        url: get_redis_url().await,
        ..RedisConfig::default()
    };
    RedisCache::from_config(&config).expect("create redis pool")
}

fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_put_map_replaces_previous_fields() {
    let cache = redis_cache().await;
    let ttl = Duration::from_secs(60);

    cache
        .put_map("test:replace", &fields(&[("name", "office"), ("priority", "1")]), ttl)
        .await
        .unwrap();
    cache
        .put_map("test:replace", &fields(&[("name", "lab")]), ttl)
        .await
        .unwrap();

    let stored = cache.get_map("test:replace").await.unwrap();
    assert_eq!(stored, fields(&[("name", "lab")]));
    assert!(cache.exists("test:replace").await.unwrap());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_field_round_trip_and_delete() {
    let cache = redis_cache().await;

    cache
        .put_field("test:hash", "hash", "abc123", Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(
        cache.get_field("test:hash", "hash").await.unwrap().as_deref(),
        Some("abc123")
    );
    assert_eq!(cache.get_field("test:hash", "other").await.unwrap(), None);

    cache.delete("test:hash").await.unwrap();
    cache.delete("test:hash").await.unwrap();
    assert!(!cache.exists("test:hash").await.unwrap());
    assert!(cache.get_map("test:hash").await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_entries_expire() {
    let cache = redis_cache().await;

    cache
        .put_map("test:ttl", &fields(&[("id", "1")]), Duration::from_millis(200))
        .await
        .unwrap();
    assert!(cache.exists("test:ttl").await.unwrap());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!cache.exists("test:ttl").await.unwrap());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_dynamic_cache_uses_redis_when_reachable() {
    let config = RedisConfig {
        enabled: true,
        url: get_redis_url().await,
        ..RedisConfig::default()
    };
    let distributed = create_distributed_cache(&config).expect("redis backend");
    let clock = Arc::new(SystemClock);
    let probe = Arc::new(CacheAvailabilityProbe::new(
        Some(distributed.clone()),
        Duration::from_secs(30),
        clock.clone(),
    ));
    let local = Arc::new(LocalCache::new(clock));
    let cache = DynamicCache::new(probe, Some(distributed.clone()), local);

    assert_eq!(cache.current_mode().await, CacheMode::Distributed);
    let result = cache.self_test().await;
    assert!(result.success, "{}", result.message);

    cache
        .put_map("test:dynamic", &fields(&[("id", "9")]), Duration::from_secs(60))
        .await;
    assert!(distributed.exists("test:dynamic").await.unwrap());
    assert!(cache.local().is_empty());
}

#[test]
fn test_disabled_redis_yields_no_backend() {
    assert!(create_distributed_cache(&RedisConfig::default()).is_none());
}
