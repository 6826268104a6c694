//! Cache facade that routes every call to Redis or the local fallback.
//!
//! ## Routing
//!
//! ```text
//! call → probe.is_available()? ──yes──→ distributed ──error──→ local (this call only)
//!                 │
//!                 no ──────────────────────────────────────→ local
//! ```
//!
//! A failing distributed call never flips the probe; availability only
//! changes on the probe's own schedule.

use super::availability::CacheAvailabilityProbe;
use super::backend::{CacheMode, DistributedCache, FieldMap};
use super::local::LocalCache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const SELF_TEST_KEY: &str = "__cache_self_test__";
const SELF_TEST_TTL: Duration = Duration::from_secs(10);

/// Snapshot of the cache subsystem for the admin status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusReport {
    pub available: bool,
    pub status: String,
    pub mode: CacheMode,
    pub local_entries: usize,
}

/// Outcome of a put/get/evict round trip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSelfTest {
    pub success: bool,
    pub mode: CacheMode,
    pub message: String,
}

pub struct DynamicCache {
    probe: Arc<CacheAvailabilityProbe>,
    distributed: Option<Arc<dyn DistributedCache>>,
    local: Arc<LocalCache>,
}

impl DynamicCache {
    pub fn new(
        probe: Arc<CacheAvailabilityProbe>,
        distributed: Option<Arc<dyn DistributedCache>>,
        local: Arc<LocalCache>,
    ) -> Self {
        Self {
            probe,
            distributed,
            local,
        }
    }

    async fn remote(&self) -> Option<&Arc<dyn DistributedCache>> {
        match &self.distributed {
            Some(remote) if self.probe.is_available().await => Some(remote),
            _ => None,
        }
    }

    pub async fn get_map(&self, key: &str) -> FieldMap {
        if let Some(remote) = self.remote().await {
            match remote.get_map(key).await {
                Ok(fields) => return fields,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "distributed get_map failed, reading local cache")
                }
            }
        }
        self.local.get_map(key)
    }

    pub async fn put_map(&self, key: &str, fields: &FieldMap, ttl: Duration) {
        if let Some(remote) = self.remote().await {
            match remote.put_map(key, fields, ttl).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "distributed put_map failed, writing local cache")
                }
            }
        }
        self.local.put_map(key, fields.clone(), ttl);
    }

    pub async fn get_string(&self, key: &str, field: &str) -> Option<String> {
        if let Some(remote) = self.remote().await {
            match remote.get_field(key, field).await {
                Ok(value) => return value,
                Err(e) => {
                    tracing::warn!(key = %key, field, error = %e, "distributed get_field failed, reading local cache")
                }
            }
        }
        self.local.get_field(key, field)
    }

    pub async fn put_string(&self, key: &str, field: &str, value: &str, ttl: Duration) {
        if let Some(remote) = self.remote().await {
            match remote.put_field(key, field, value, ttl).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(key = %key, field, error = %e, "distributed put_field failed, writing local cache")
                }
            }
        }
        self.local.put_field(key, field, value, ttl);
    }

    /// Removes `key` everywhere it may live. Distributed failures are logged
    /// and swallowed. The local copy is always dropped so an entry written
    /// during an earlier outage cannot resurface during the next one.
    pub async fn evict(&self, key: &str) {
        if let Some(remote) = self.remote().await
            && let Err(e) = remote.delete(key).await
        {
            tracing::warn!(key = %key, error = %e, "distributed evict failed");
        }
        self.local.evict(key);
    }

    pub async fn current_mode(&self) -> CacheMode {
        if self.remote().await.is_some() {
            CacheMode::Distributed
        } else {
            CacheMode::Local
        }
    }

    pub async fn status_report(&self) -> CacheStatusReport {
        let mode = self.current_mode().await;
        CacheStatusReport {
            available: mode == CacheMode::Distributed,
            status: self.probe.status(),
            mode,
            local_entries: self.local.len(),
        }
    }

    /// Forces a probe and returns the resulting report.
    pub async fn refresh(&self) -> CacheStatusReport {
        let available = self.probe.refresh().await;
        tracing::info!(available, "cache availability refreshed");
        self.status_report().await
    }

    pub async fn self_test(&self) -> CacheSelfTest {
        let mode = self.current_mode().await;
        let value = beacon_core::epoch_millis(beacon_core::now_utc()).to_string();

        self.put_string(SELF_TEST_KEY, "value", &value, SELF_TEST_TTL)
            .await;
        let read_back = self.get_string(SELF_TEST_KEY, "value").await;
        self.evict(SELF_TEST_KEY).await;

        let (success, message) = match read_back {
            Some(found) if found == value => (true, format!("round trip succeeded ({mode})")),
            Some(found) => (
                false,
                format!("read back {found:?}, expected {value:?} ({mode})"),
            ),
            None => (false, format!("value missing after write ({mode})")),
        };
        if !success {
            tracing::warn!(%mode, %message, "cache self-test failed");
        }
        CacheSelfTest {
            success,
            mode,
            message,
        }
    }

    pub fn probe(&self) -> &Arc<CacheAvailabilityProbe> {
        &self.probe
    }

    pub fn local(&self) -> &Arc<LocalCache> {
        &self.local
    }
}

impl std::fmt::Debug for DynamicCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicCache")
            .field("probe", &self.probe)
            .field("local", &self.local)
            .finish()
    }
}
