use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use beacon_core::{ClientPolicyMapping, ClientRecord, OnlineStatus, Policy, PolicyId};
use beacon_storage::{BeaconStorage, StorageError};
use dashmap::DashMap;
use papaya::HashMap as PapayaHashMap;
use time::OffsetDateTime;

/// In-memory storage backend.
///
/// This storage implementation provides:
/// - Lock-free concurrent access to policy and client rows via papaya::HashMap
/// - Mapping rows grouped per client id in a DashMap, so that a client's
///   deactivate-then-activate runs under that client's shard lock only
#[derive(Debug)]
pub struct InMemoryStorage {
    policies: Arc<PapayaHashMap<i64, Policy>>,
    clients: Arc<PapayaHashMap<i64, ClientRecord>>,
    /// client_id -> every mapping row of that client
    mappings: Arc<DashMap<String, Vec<ClientPolicyMapping>>>,
    mapping_ids: AtomicI64,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self {
            policies: Arc::new(PapayaHashMap::new()),
            clients: Arc::new(PapayaHashMap::new()),
            mappings: Arc::new(DashMap::new()),
            mapping_ids: AtomicI64::new(1),
        }
    }

    fn next_mapping_id(&self) -> i64 {
        self.mapping_ids.fetch_add(1, Ordering::SeqCst)
    }

    pub fn policy_count(&self) -> usize {
        self.policies.pin().len()
    }
}

#[async_trait]
impl BeaconStorage for InMemoryStorage {
    async fn get_policy(&self, id: PolicyId) -> Result<Option<Policy>, StorageError> {
        let guard = self.policies.pin();
        Ok(guard.get(&id.get()).cloned())
    }

    async fn find_default_policy(&self) -> Result<Option<Policy>, StorageError> {
        let guard = self.policies.pin();
        Ok(guard
            .iter()
            .map(|(_, policy)| policy)
            .find(|policy| policy.is_default)
            .cloned())
    }

    async fn count_default_policies(&self) -> Result<usize, StorageError> {
        let guard = self.policies.pin();
        Ok(guard.iter().filter(|(_, policy)| policy.is_default).count())
    }

    async fn insert_policy(&self, policy: &Policy) -> Result<(), StorageError> {
        let guard = self.policies.pin();
        guard
            .try_insert(policy.id.get(), policy.clone())
            .map(|_| ())
            .map_err(|_| StorageError::already_exists("policy", policy.id))
    }

    async fn update_policy(&self, policy: &Policy) -> Result<(), StorageError> {
        let guard = self.policies.pin();
        match guard.update(policy.id.get(), |_| policy.clone()) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found("policy", policy.id)),
        }
    }

    async fn delete_policy(&self, id: PolicyId) -> Result<bool, StorageError> {
        let guard = self.policies.pin();
        Ok(guard.remove(&id.get()).is_some())
    }

    async fn find_active_mapping(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientPolicyMapping>, StorageError> {
        let Some(rows) = self.mappings.get(client_id) else {
            return Ok(None);
        };
        Ok(rows
            .iter()
            .filter(|m| m.is_active)
            .max_by_key(|m| m.activated_at)
            .cloned())
    }

    async fn find_mapping(
        &self,
        client_id: &str,
        policy_id: PolicyId,
    ) -> Result<Option<ClientPolicyMapping>, StorageError> {
        Ok(self
            .mappings
            .get(client_id)
            .and_then(|rows| rows.iter().find(|m| m.policy_id == policy_id).cloned()))
    }

    async fn activate_mapping(
        &self,
        client_id: &str,
        policy_id: PolicyId,
        at: OffsetDateTime,
    ) -> Result<ClientPolicyMapping, StorageError> {
        // The entry guard holds the shard write lock for the whole unit.
        let mut rows = self.mappings.entry(client_id.to_string()).or_default();
        for row in rows.iter_mut() {
            row.is_active = false;
        }

        if let Some(row) = rows.iter_mut().find(|m| m.policy_id == policy_id) {
            row.is_active = true;
            row.activated_at = Some(at);
            return Ok(row.clone());
        }

        let mapping = ClientPolicyMapping {
            id: self.next_mapping_id(),
            client_id: client_id.to_string(),
            policy_id,
            assigned_at: at,
            activated_at: Some(at),
            is_active: true,
        };
        rows.push(mapping.clone());
        Ok(mapping)
    }

    async fn client_ids_for_policy(
        &self,
        policy_id: PolicyId,
    ) -> Result<Vec<String>, StorageError> {
        let mut ids: Vec<String> = self
            .mappings
            .iter()
            .filter(|entry| entry.value().iter().any(|m| m.policy_id == policy_id))
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn policy_ids_for_client(&self, client_id: &str) -> Result<Vec<PolicyId>, StorageError> {
        Ok(self
            .mappings
            .get(client_id)
            .map(|rows| rows.iter().map(|m| m.policy_id).collect())
            .unwrap_or_default())
    }

    async fn delete_mappings_for_policy(&self, policy_id: PolicyId) -> Result<usize, StorageError> {
        let mut removed = 0;
        for mut entry in self.mappings.iter_mut() {
            let before = entry.len();
            entry.retain(|m| m.policy_id != policy_id);
            removed += before - entry.len();
        }
        self.mappings.retain(|_, rows| !rows.is_empty());
        Ok(removed)
    }

    async fn count_active_mappings(&self, client_id: &str) -> Result<usize, StorageError> {
        Ok(self
            .mappings
            .get(client_id)
            .map(|rows| rows.iter().filter(|m| m.is_active).count())
            .unwrap_or(0))
    }

    async fn find_client_by_mac(&self, mac: &str) -> Result<Option<ClientRecord>, StorageError> {
        let guard = self.clients.pin();
        Ok(guard
            .iter()
            .map(|(_, client)| client)
            .find(|client| {
                client
                    .mac_address
                    .as_deref()
                    .is_some_and(|m| m.eq_ignore_ascii_case(mac))
            })
            .cloned())
    }

    async fn get_client(&self, id: i64) -> Result<Option<ClientRecord>, StorageError> {
        let guard = self.clients.pin();
        Ok(guard.get(&id).cloned())
    }

    async fn insert_client(&self, client: &ClientRecord) -> Result<(), StorageError> {
        let guard = self.clients.pin();
        guard
            .try_insert(client.id, client.clone())
            .map(|_| ())
            .map_err(|_| StorageError::already_exists("client", client.id))
    }

    async fn touch_client(&self, id: i64, seen_at: OffsetDateTime) -> Result<bool, StorageError> {
        let guard = self.clients.pin();
        let updated = guard.update(id, |client| ClientRecord {
            last_seen_at: Some(seen_at),
            ..client.clone()
        });
        Ok(updated.is_some())
    }

    async fn update_client_status(
        &self,
        id: i64,
        status: OnlineStatus,
        at: OffsetDateTime,
    ) -> Result<bool, StorageError> {
        let guard = self.clients.pin();
        let updated = guard.update(id, |client| {
            let mut next = client.clone();
            next.online_status = status;
            next.updated_at = at;
            if status == OnlineStatus::Online {
                next.last_seen_at = Some(at);
            }
            next
        });
        Ok(updated.is_some())
    }

    async fn find_stale_online_clients(
        &self,
        threshold: OffsetDateTime,
    ) -> Result<Vec<ClientRecord>, StorageError> {
        let guard = self.clients.pin();
        Ok(guard
            .iter()
            .map(|(_, client)| client)
            .filter(|client| client.is_online())
            .filter(|client| client.last_seen_at.is_none_or(|seen| seen < threshold))
            .cloned()
            .collect())
    }

    async fn count_clients(&self, status: Option<OnlineStatus>) -> Result<usize, StorageError> {
        let guard = self.clients.pin();
        Ok(guard
            .iter()
            .filter(|(_, client)| status.is_none_or(|s| client.online_status == s))
            .count())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::PolicyStatus;
    use time::Duration;
    use time::macros::datetime;

    fn policy(id: i64, is_default: bool) -> Policy {
        Policy {
            id: PolicyId(id),
            name: format!("policy-{id}"),
            description: None,
            status: PolicyStatus::Enabled,
            version: Some("1".to_string()),
            is_default,
            priority: 0,
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: datetime!(2024-01-01 0:00 UTC),
        }
    }

    #[tokio::test]
    async fn test_policy_crud() {
        let storage = InMemoryStorage::new();
        storage.insert_policy(&policy(1, false)).await.unwrap();
        assert_eq!(storage.policy_count(), 1);

        let err = storage.insert_policy(&policy(1, false)).await.unwrap_err();
        assert!(err.is_already_exists());

        let mut updated = policy(1, false);
        updated.name = "renamed".to_string();
        storage.update_policy(&updated).await.unwrap();
        let read = storage.get_policy(PolicyId(1)).await.unwrap().unwrap();
        assert_eq!(read.name, "renamed");

        let err = storage.update_policy(&policy(2, false)).await.unwrap_err();
        assert!(err.is_not_found());

        assert!(storage.delete_policy(PolicyId(1)).await.unwrap());
        assert!(!storage.delete_policy(PolicyId(1)).await.unwrap());
        assert!(storage.get_policy(PolicyId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_policy_lookup() {
        let storage = InMemoryStorage::new();
        assert!(storage.find_default_policy().await.unwrap().is_none());
        assert_eq!(storage.count_default_policies().await.unwrap(), 0);

        storage.insert_policy(&policy(1, false)).await.unwrap();
        storage.insert_policy(&policy(2, true)).await.unwrap();

        let default = storage.find_default_policy().await.unwrap().unwrap();
        assert_eq!(default.id, PolicyId(2));
        assert_eq!(storage.count_default_policies().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_activation_leaves_single_active_mapping() {
        let storage = InMemoryStorage::new();
        let t0 = datetime!(2024-01-01 0:00 UTC);

        storage.activate_mapping("c1", PolicyId(1), t0).await.unwrap();
        storage
            .activate_mapping("c1", PolicyId(2), t0 + Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(storage.count_active_mappings("c1").await.unwrap(), 1);
        let active = storage.find_active_mapping("c1").await.unwrap().unwrap();
        assert_eq!(active.policy_id, PolicyId(2));

        let a = storage.find_mapping("c1", PolicyId(1)).await.unwrap().unwrap();
        assert!(!a.is_active);

        // Re-activating A reuses the existing row.
        let again = storage
            .activate_mapping("c1", PolicyId(1), t0 + Duration::seconds(2))
            .await
            .unwrap();
        assert_eq!(again.id, a.id);
        assert_eq!(again.assigned_at, t0);
        assert_eq!(storage.policy_ids_for_client("c1").await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_activation_same_client() {
        let storage = Arc::new(InMemoryStorage::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move {
                    storage
                        .activate_mapping("c1", PolicyId(i % 4), OffsetDateTime::now_utc())
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(storage.count_active_mappings("c1").await.unwrap(), 1);
        assert_eq!(storage.policy_ids_for_client("c1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_delete_mappings_for_policy() {
        let storage = InMemoryStorage::new();
        let now = OffsetDateTime::now_utc();
        for client in ["c1", "c2", "c3"] {
            storage.activate_mapping(client, PolicyId(9), now).await.unwrap();
        }
        storage.activate_mapping("c4", PolicyId(8), now).await.unwrap();

        assert_eq!(
            storage.client_ids_for_policy(PolicyId(9)).await.unwrap(),
            vec!["c1", "c2", "c3"]
        );
        assert_eq!(storage.delete_mappings_for_policy(PolicyId(9)).await.unwrap(), 3);
        assert!(storage.client_ids_for_policy(PolicyId(9)).await.unwrap().is_empty());
        assert!(storage.find_active_mapping("c1").await.unwrap().is_none());
        assert_eq!(storage.count_active_mappings("c4").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_client_liveness_rows() {
        let storage = InMemoryStorage::new();
        let client = ClientRecord::new(100, "ws-100", Some("AA:BB:CC:00:11:22".to_string()));
        storage.insert_client(&client).await.unwrap();

        let found = storage
            .find_client_by_mac("aa:bb:cc:00:11:22")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, 100);

        let t0 = datetime!(2024-06-01 8:00 UTC);
        assert!(storage.update_client_status(100, OnlineStatus::Online, t0).await.unwrap());
        assert_eq!(storage.count_clients(Some(OnlineStatus::Online)).await.unwrap(), 1);

        let t1 = t0 + Duration::minutes(1);
        assert!(storage.touch_client(100, t1).await.unwrap());
        let read = storage.get_client(100).await.unwrap().unwrap();
        assert_eq!(read.last_seen_at, Some(t1));
        assert_eq!(read.updated_at, t0);

        let stale = storage
            .find_stale_online_clients(t1 + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert!(storage.find_stale_online_clients(t0).await.unwrap().is_empty());

        assert!(!storage.touch_client(404, t1).await.unwrap());
        assert_eq!(storage.count_clients(None).await.unwrap(), 1);
    }
}
