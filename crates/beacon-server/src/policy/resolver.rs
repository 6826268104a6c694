//! Effective-policy resolution with a read-through cache in front of the store.
//!
//! Resolution order for a client:
//!
//! 1. its single active mapping, when the referenced policy is enabled and
//!    not the default policy
//! 2. otherwise the default policy
//! 3. otherwise nothing
//!
//! Priority is not consulted here: an explicit activation always wins.

use super::fields::{policy_from_fields, policy_to_fields};
use super::hash::policy_hash;
use crate::cache::{DynamicCache, read_through};
use beacon_core::Policy;
use beacon_storage::{DynStorage, StorageResult};
use std::sync::Arc;
use std::time::Duration;

pub const POLICY_KEY_PREFIX: &str = "heartbeat:policy:";
pub const HASH_KEY_PREFIX: &str = "heartbeat:hash:";
pub const HASH_FIELD: &str = "hash";

pub fn policy_key(client_id: &str) -> String {
    format!("{POLICY_KEY_PREFIX}{client_id}")
}

pub fn hash_key(client_id: &str) -> String {
    format!("{HASH_KEY_PREFIX}{client_id}")
}

pub struct PolicyResolver {
    storage: DynStorage,
    cache: Arc<DynamicCache>,
    ttl: Duration,
}

impl PolicyResolver {
    pub fn new(storage: DynStorage, cache: Arc<DynamicCache>, ttl: Duration) -> Self {
        Self {
            storage,
            cache,
            ttl,
        }
    }

    /// Resolves straight from the store, bypassing the cache.
    pub async fn resolve_from_store(&self, client_id: &str) -> StorageResult<Option<Policy>> {
        if let Some(mapping) = self.storage.find_active_mapping(client_id).await? {
            match self.storage.get_policy(mapping.policy_id).await? {
                Some(policy) if policy.can_override_default() => return Ok(Some(policy)),
                Some(policy) => tracing::debug!(
                    client_id = %client_id,
                    policy_id = %policy.id,
                    "active policy cannot override default"
                ),
                None => tracing::warn!(
                    client_id = %client_id,
                    policy_id = %mapping.policy_id,
                    "active mapping references missing policy"
                ),
            }
        }
        self.storage.find_default_policy().await
    }

    /// The policy governing `client_id`, or `None` when nothing applies.
    pub async fn get_effective_policy(&self, client_id: &str) -> StorageResult<Option<Policy>> {
        if client_id.trim().is_empty() {
            return Ok(None);
        }
        read_through(
            &self.cache,
            &policy_key(client_id),
            self.ttl,
            policy_from_fields,
            policy_to_fields,
            || self.resolve_from_store(client_id),
        )
        .await
    }

    /// Hash of the effective policy, cached under its own key.
    pub async fn get_policy_hash(&self, client_id: &str) -> StorageResult<Option<String>> {
        if client_id.trim().is_empty() {
            return Ok(None);
        }
        let key = hash_key(client_id);
        if let Some(hash) = self.cache.get_string(&key, HASH_FIELD).await
            && !hash.is_empty()
        {
            return Ok(Some(hash));
        }

        let Some(policy) = self.get_effective_policy(client_id).await? else {
            return Ok(None);
        };
        let hash = policy_hash(&policy);
        self.cache
            .put_string(&key, HASH_FIELD, &hash, self.ttl)
            .await;
        Ok(Some(hash))
    }

    /// Recomputes and caches the client's policy and hash from the store.
    /// Clears both entries when nothing applies any more.
    pub async fn prewarm(&self, client_id: &str) -> StorageResult<Option<Policy>> {
        let policy = self.resolve_from_store(client_id).await?;
        match &policy {
            Some(policy) => {
                match policy_to_fields(policy) {
                    Some(fields) => {
                        self.cache
                            .put_map(&policy_key(client_id), &fields, self.ttl)
                            .await
                    }
                    None => self.cache.evict(&policy_key(client_id)).await,
                }
                self.cache
                    .put_string(&hash_key(client_id), HASH_FIELD, &policy_hash(policy), self.ttl)
                    .await;
                tracing::debug!(client_id = %client_id, policy_id = %policy.id, "policy cache warmed");
            }
            None => self.evict_client(client_id).await,
        }
        Ok(policy)
    }

    /// Drops the cached policy and hash of `client_id`.
    pub async fn evict_client(&self, client_id: &str) {
        self.cache.evict(&policy_key(client_id)).await;
        self.cache.evict(&hash_key(client_id)).await;
    }

    pub fn cache(&self) -> &Arc<DynamicCache> {
        &self.cache
    }
}
