//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use async_trait::async_trait;
use beacon_core::{ClientPolicyMapping, ClientRecord, OnlineStatus, Policy, PolicyId};
use beacon_db_memory::InMemoryStorage;
use beacon_server::cache::{CacheError, DistributedCache, FieldMap};
use beacon_server::config::AppConfig;
use beacon_server::{AppState, ManualClock, build_services_with};
use beacon_storage::{BeaconStorage, DynStorage, StorageError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use time::OffsetDateTime;

pub const SETTLE: Duration = Duration::from_secs(5);

/// Distributed backend kept in memory; every call fails while `failing` is set.
#[derive(Default)]
pub struct FakeDistributedCache {
    maps: Mutex<HashMap<String, FieldMap>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeDistributedCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self, key: &str) -> Option<FieldMap> {
        self.maps.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.maps.lock().keys().cloned().collect()
    }

    fn enter(&self) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Pool("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DistributedCache for FakeDistributedCache {
    async fn get_map(&self, key: &str) -> Result<FieldMap, CacheError> {
        self.enter()?;
        Ok(self.stored(key).unwrap_or_default())
    }

    async fn put_map(&self, key: &str, fields: &FieldMap, _ttl: Duration) -> Result<(), CacheError> {
        self.enter()?;
        let mut maps = self.maps.lock();
        if fields.is_empty() {
            maps.remove(key);
        } else {
            maps.insert(key.to_string(), fields.clone());
        }
        Ok(())
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        self.enter()?;
        Ok(self.maps.lock().get(key).and_then(|m| m.get(field).cloned()))
    }

    async fn put_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        self.enter()?;
        self.maps
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.enter()?;
        self.maps.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.enter()?;
        Ok(self.maps.lock().contains_key(key))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// In-memory storage that can be told to fail policy resolution, either for
/// selected clients or for everyone. Mapping activation and policy row
/// deletion can be failed separately.
pub struct FaultyStorage {
    inner: InMemoryStorage,
    broken_clients: Mutex<HashSet<String>>,
    broken: AtomicBool,
    failing_activations: Mutex<HashSet<String>>,
    fail_policy_delete: AtomicBool,
}

impl FaultyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStorage::new(),
            broken_clients: Mutex::new(HashSet::new()),
            broken: AtomicBool::new(false),
            failing_activations: Mutex::new(HashSet::new()),
            fail_policy_delete: AtomicBool::new(false),
        })
    }

    pub fn fail_activation(&self, client_id: &str) {
        self.failing_activations.lock().insert(client_id.to_string());
    }

    pub fn fail_policy_delete(&self, fail: bool) {
        self.fail_policy_delete.store(fail, Ordering::SeqCst);
    }

    pub fn break_client(&self, client_id: &str) {
        self.broken_clients.lock().insert(client_id.to_string());
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    fn check(&self, client_id: &str) -> Result<(), StorageError> {
        if self.broken.load(Ordering::SeqCst) || self.broken_clients.lock().contains(client_id) {
            Err(StorageError::connection_error("database unreachable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BeaconStorage for FaultyStorage {
    async fn get_policy(&self, id: PolicyId) -> Result<Option<Policy>, StorageError> {
        self.inner.get_policy(id).await
    }

    async fn find_default_policy(&self) -> Result<Option<Policy>, StorageError> {
        self.inner.find_default_policy().await
    }

    async fn count_default_policies(&self) -> Result<usize, StorageError> {
        self.inner.count_default_policies().await
    }

    async fn insert_policy(&self, policy: &Policy) -> Result<(), StorageError> {
        self.inner.insert_policy(policy).await
    }

    async fn update_policy(&self, policy: &Policy) -> Result<(), StorageError> {
        self.inner.update_policy(policy).await
    }

    async fn delete_policy(&self, id: PolicyId) -> Result<bool, StorageError> {
        if self.fail_policy_delete.load(Ordering::SeqCst) {
            return Err(StorageError::connection_error("database unreachable"));
        }
        self.inner.delete_policy(id).await
    }

    async fn find_active_mapping(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientPolicyMapping>, StorageError> {
        self.check(client_id)?;
        self.inner.find_active_mapping(client_id).await
    }

    async fn find_mapping(
        &self,
        client_id: &str,
        policy_id: PolicyId,
    ) -> Result<Option<ClientPolicyMapping>, StorageError> {
        self.inner.find_mapping(client_id, policy_id).await
    }

    async fn activate_mapping(
        &self,
        client_id: &str,
        policy_id: PolicyId,
        at: OffsetDateTime,
    ) -> Result<ClientPolicyMapping, StorageError> {
        if self.failing_activations.lock().contains(client_id) {
            return Err(StorageError::connection_error("database unreachable"));
        }
        self.inner.activate_mapping(client_id, policy_id, at).await
    }

    async fn client_ids_for_policy(&self, policy_id: PolicyId) -> Result<Vec<String>, StorageError> {
        self.inner.client_ids_for_policy(policy_id).await
    }

    async fn policy_ids_for_client(&self, client_id: &str) -> Result<Vec<PolicyId>, StorageError> {
        self.inner.policy_ids_for_client(client_id).await
    }

    async fn delete_mappings_for_policy(&self, policy_id: PolicyId) -> Result<usize, StorageError> {
        self.inner.delete_mappings_for_policy(policy_id).await
    }

    async fn count_active_mappings(&self, client_id: &str) -> Result<usize, StorageError> {
        self.inner.count_active_mappings(client_id).await
    }

    async fn find_client_by_mac(&self, mac: &str) -> Result<Option<ClientRecord>, StorageError> {
        self.inner.find_client_by_mac(mac).await
    }

    async fn get_client(&self, id: i64) -> Result<Option<ClientRecord>, StorageError> {
        self.inner.get_client(id).await
    }

    async fn insert_client(&self, client: &ClientRecord) -> Result<(), StorageError> {
        self.inner.insert_client(client).await
    }

    async fn touch_client(&self, id: i64, seen_at: OffsetDateTime) -> Result<bool, StorageError> {
        self.inner.touch_client(id, seen_at).await
    }

    async fn update_client_status(
        &self,
        id: i64,
        status: OnlineStatus,
        at: OffsetDateTime,
    ) -> Result<bool, StorageError> {
        self.inner.update_client_status(id, status, at).await
    }

    async fn find_stale_online_clients(
        &self,
        threshold: OffsetDateTime,
    ) -> Result<Vec<ClientRecord>, StorageError> {
        self.inner.find_stale_online_clients(threshold).await
    }

    async fn count_clients(&self, status: Option<OnlineStatus>) -> Result<usize, StorageError> {
        self.inner.count_clients(status).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty-memory"
    }
}

/// Config tuned for tests: no re-warm pause, small pools.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.invalidation.rewarm_delay_ms = 0;
    config.invalidation.workers = 2;
    config.heartbeat.liveness_workers = Some(2);
    config
}

pub struct TestEnv {
    pub state: AppState,
    pub storage: DynStorage,
    pub remote: Arc<FakeDistributedCache>,
    pub clock: Arc<ManualClock>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_storage(Arc::new(InMemoryStorage::new())).await
    }

    pub async fn with_storage(storage: DynStorage) -> Self {
        Self::build(test_config(), storage).await
    }

    pub async fn build(config: AppConfig, storage: DynStorage) -> Self {
        let remote = FakeDistributedCache::new();
        let clock = Arc::new(ManualClock::new());
        let distributed: Arc<dyn DistributedCache> = remote.clone();
        let state = build_services_with(config, storage.clone(), Some(distributed), clock.clone())
            .await
            .expect("build services");
        Self {
            state,
            storage,
            remote,
            clock,
        }
    }

    /// Waits for queued liveness and re-warm jobs.
    pub async fn settle(&self) {
        assert!(self.state.liveness_pool.wait_idle(SETTLE).await);
        assert!(self.state.maintenance_pool.wait_idle(SETTLE).await);
    }
}
