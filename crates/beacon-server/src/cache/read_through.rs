//! Explicit read-through wrapper: cache first, loader on miss, write back on success.

use super::backend::FieldMap;
use super::dynamic::DynamicCache;
use std::future::Future;
use std::time::Duration;

/// Reads `key` through `cache`, calling `load` on a miss.
///
/// A cached map that `decode` rejects counts as a miss and is evicted.
/// Loader errors propagate; `None` results, and values `encode` declines,
/// are not cached.
pub async fn read_through<T, E, Load, Fut>(
    cache: &DynamicCache,
    key: &str,
    ttl: Duration,
    decode: impl Fn(&FieldMap) -> Option<T>,
    encode: impl Fn(&T) -> Option<FieldMap>,
    load: Load,
) -> Result<Option<T>, E>
where
    Load: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let cached = cache.get_map(key).await;
    if !cached.is_empty() {
        if let Some(value) = decode(&cached) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(Some(value));
        }
        tracing::warn!(key = %key, "discarding undecodable cache entry");
        cache.evict(key).await;
    } else {
        tracing::debug!(key = %key, "cache miss");
    }

    let loaded = load().await?;
    if let Some(fields) = loaded.as_ref().and_then(&encode) {
        cache.put_map(key, &fields, ttl).await;
    }
    Ok(loaded)
}
