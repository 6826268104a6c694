//! Cache repair after policy mutations.
//!
//! Saves and status changes hand the whole repair (listing mapped clients,
//! eviction, re-warm) to the maintenance pool so the admin call returns
//! without touching the cache. When the queue is full the eviction runs on
//! the caller instead. Assignments and deletes already know their clients
//! and evict before returning. Re-warming goes one client at a time with a
//! short pause between clients; a failing client is logged and skipped.

use super::resolver::PolicyResolver;
use crate::tasks::WorkerPool;
use beacon_core::{PolicyId, PolicyStatus};
use beacon_storage::{DynStorage, StorageResult};
use std::sync::Arc;
use std::time::Duration;

pub struct CacheInvalidationCoordinator {
    storage: DynStorage,
    resolver: Arc<PolicyResolver>,
    pool: WorkerPool,
    rewarm_delay: Duration,
}

impl CacheInvalidationCoordinator {
    pub fn new(
        storage: DynStorage,
        resolver: Arc<PolicyResolver>,
        pool: WorkerPool,
        rewarm_delay: Duration,
    ) -> Self {
        Self {
            storage,
            resolver,
            pool,
            rewarm_delay,
        }
    }

    /// After a create or update of `policy_id`.
    pub async fn on_policy_saved(&self, policy_id: PolicyId) {
        self.refresh_policy_clients(policy_id, "saved").await;
    }

    /// After `policy_id` was enabled or disabled.
    pub async fn on_policy_status_changed(&self, policy_id: PolicyId, status: PolicyStatus) {
        self.refresh_policy_clients(policy_id, status.as_str()).await;
    }

    /// After the given clients had their active mapping changed.
    pub async fn on_clients_assigned(&self, client_ids: &[String]) {
        if client_ids.is_empty() {
            return;
        }
        self.evict_clients(client_ids).await;
        self.schedule_rewarm(client_ids.to_vec(), "assigned");
    }

    /// Clients currently mapped to `policy_id`. Collect these before deleting.
    pub async fn affected_clients(&self, policy_id: PolicyId) -> StorageResult<Vec<String>> {
        self.storage.client_ids_for_policy(policy_id).await
    }

    /// After `policy_id` and its mappings were deleted. Evicts only.
    pub async fn on_policy_deleted(&self, policy_id: PolicyId, client_ids: &[String]) {
        self.evict_clients(client_ids).await;
        tracing::info!(
            policy_id = %policy_id,
            clients = client_ids.len(),
            "evicted caches of deleted policy"
        );
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    async fn refresh_policy_clients(&self, policy_id: PolicyId, reason: &'static str) {
        let storage = self.storage.clone();
        let resolver = Arc::clone(&self.resolver);
        let delay = self.rewarm_delay;
        let accepted = self.pool.submit(async move {
            let Some(client_ids) = list_clients(&storage, policy_id, reason).await else {
                return;
            };
            evict_all(&resolver, &client_ids).await;
            rewarm_clients(&resolver, &client_ids, delay, reason).await;
        });
        if accepted {
            tracing::debug!(policy_id = %policy_id, reason, "cache refresh scheduled");
            return;
        }

        // Queue full: evict here and skip the re-warm.
        if let Some(client_ids) = list_clients(&self.storage, policy_id, reason).await {
            self.evict_clients(&client_ids).await;
        }
    }

    async fn evict_clients(&self, client_ids: &[String]) {
        evict_all(&self.resolver, client_ids).await;
    }

    fn schedule_rewarm(&self, client_ids: Vec<String>, reason: &'static str) -> bool {
        let resolver = Arc::clone(&self.resolver);
        let delay = self.rewarm_delay;
        let count = client_ids.len();
        let accepted = self.pool.submit(async move {
            rewarm_clients(&resolver, &client_ids, delay, reason).await;
        });
        if accepted {
            tracing::debug!(clients = count, reason, "cache re-warm scheduled");
        }
        accepted
    }
}

async fn list_clients(
    storage: &DynStorage,
    policy_id: PolicyId,
    reason: &'static str,
) -> Option<Vec<String>> {
    match storage.client_ids_for_policy(policy_id).await {
        Ok(ids) if ids.is_empty() => {
            tracing::debug!(policy_id = %policy_id, reason, "no clients to refresh");
            None
        }
        Ok(ids) => Some(ids),
        Err(e) => {
            tracing::warn!(
                policy_id = %policy_id,
                error = %e,
                category = %e.category(),
                "cannot list clients for cache refresh"
            );
            None
        }
    }
}

async fn evict_all(resolver: &PolicyResolver, client_ids: &[String]) {
    for client_id in client_ids {
        resolver.evict_client(client_id).await;
    }
}

async fn rewarm_clients(
    resolver: &PolicyResolver,
    client_ids: &[String],
    delay: Duration,
    reason: &'static str,
) {
    let mut failures = 0usize;
    for (i, client_id) in client_ids.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Err(e) = resolver.prewarm(client_id).await {
            failures += 1;
            tracing::warn!(client_id = %client_id, error = %e, "cache re-warm failed");
        }
    }
    tracing::info!(
        clients = client_ids.len(),
        failures,
        reason,
        "policy caches re-warmed"
    );
}
