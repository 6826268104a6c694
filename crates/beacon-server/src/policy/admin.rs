//! Policy administration: the mutations that keep policy caches honest.
//!
//! Every mutation completes its store write first, then hands the affected
//! clients to the [`CacheInvalidationCoordinator`]. The default policy is
//! created once and is never updated, toggled, or deleted afterwards.

use super::invalidation::CacheInvalidationCoordinator;
use super::resolver::PolicyResolver;
use crate::error::{AdminError, AdminResult};
use beacon_core::{
    ClientPolicyMapping, IdGenerator, Policy, PolicyId, PolicyStatus, epoch_millis, now_utc,
};
use beacon_storage::DynStorage;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// Admin input for creating or updating a policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDraft {
    /// Present for updates, absent for creates.
    #[serde(default)]
    pub id: Option<PolicyId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<PolicyStatus>,
    #[serde(default)]
    pub priority: Option<i32>,
}

impl PolicyDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

pub struct PolicyAdminService {
    storage: DynStorage,
    resolver: Arc<PolicyResolver>,
    invalidation: Arc<CacheInvalidationCoordinator>,
    ids: IdGenerator,
    // serializes the exists-check and insert of the default policy
    default_lock: Mutex<()>,
}

fn version_token(at: OffsetDateTime) -> String {
    epoch_millis(at).to_string()
}

fn require_client_id(client_id: &str) -> AdminResult<&str> {
    let trimmed = client_id.trim();
    if trimmed.is_empty() {
        return Err(AdminError::validation("clientId is required"));
    }
    Ok(trimmed)
}

fn require_name(name: &str) -> AdminResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AdminError::validation("policy name is required"));
    }
    Ok(trimmed.to_string())
}

impl PolicyAdminService {
    pub fn new(
        storage: DynStorage,
        resolver: Arc<PolicyResolver>,
        invalidation: Arc<CacheInvalidationCoordinator>,
    ) -> Self {
        Self {
            storage,
            resolver,
            invalidation,
            ids: IdGenerator::new(),
            default_lock: Mutex::new(()),
        }
    }

    /// Creates a policy when `draft.id` is absent, updates it otherwise.
    pub async fn create_or_update_policy(&self, draft: PolicyDraft) -> AdminResult<Policy> {
        let name = require_name(&draft.name)?;
        let now = now_utc();

        let policy = match draft.id {
            None => {
                let policy = Policy {
                    id: PolicyId(self.ids.next_id()),
                    name,
                    description: draft.description,
                    status: draft.status.unwrap_or_default(),
                    version: Some(version_token(now)),
                    is_default: false,
                    priority: draft.priority.unwrap_or(0),
                    created_at: now,
                    updated_at: now,
                };
                self.storage.insert_policy(&policy).await?;
                tracing::info!(policy_id = %policy.id, name = %policy.name, "policy created");
                policy
            }
            Some(id) => {
                let existing = self.existing_mutable(id).await?;
                let policy = Policy {
                    name,
                    description: draft.description.or(existing.description),
                    status: draft.status.unwrap_or(existing.status),
                    version: Some(version_token(now)),
                    priority: draft.priority.unwrap_or(existing.priority),
                    updated_at: now,
                    ..existing
                };
                self.storage.update_policy(&policy).await?;
                tracing::info!(policy_id = %policy.id, name = %policy.name, "policy updated");
                policy
            }
        };

        self.invalidation.on_policy_saved(policy.id).await;
        Ok(policy)
    }

    /// Creates the single default policy. Fails if one already exists.
    pub async fn create_default_policy(&self, draft: PolicyDraft) -> AdminResult<Policy> {
        let name = require_name(&draft.name)?;
        let _guard = self.default_lock.lock().await;
        if self.storage.count_default_policies().await? > 0 {
            return Err(AdminError::DefaultPolicyExists);
        }

        let now = now_utc();
        let policy = Policy {
            id: PolicyId(self.ids.next_id()),
            name,
            description: draft.description,
            status: PolicyStatus::Enabled,
            version: Some(version_token(now)),
            is_default: true,
            priority: i32::MAX,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_policy(&policy).await?;
        tracing::info!(policy_id = %policy.id, name = %policy.name, "default policy created");
        Ok(policy)
    }

    /// Enables or disables a policy. `status` is `"enabled"` or `"disabled"`.
    pub async fn update_policy_status(&self, id: PolicyId, status: &str) -> AdminResult<Policy> {
        let status: PolicyStatus = status.trim().parse()?;
        let existing = self.existing_mutable(id).await?;
        let policy = Policy {
            status,
            updated_at: now_utc(),
            ..existing
        };
        self.storage.update_policy(&policy).await?;
        tracing::info!(policy_id = %id, status = %status, "policy status changed");

        self.invalidation.on_policy_status_changed(id, status).await;
        Ok(policy)
    }

    /// Makes `policy_id` the active policy of `client_id`.
    pub async fn assign_policy_to_client(
        &self,
        client_id: &str,
        policy_id: PolicyId,
    ) -> AdminResult<ClientPolicyMapping> {
        let client_id = require_client_id(client_id)?;
        self.existing(policy_id).await?;

        let mapping = self
            .storage
            .activate_mapping(client_id, policy_id, now_utc())
            .await?;
        tracing::info!(client_id = %client_id, policy_id = %policy_id, "policy assigned");

        self.invalidation
            .on_clients_assigned(&[client_id.to_string()])
            .await;
        Ok(mapping)
    }

    /// Assigns `policy_id` to every listed client. Blank and duplicate ids are skipped.
    pub async fn assign_policy_to_clients(
        &self,
        client_ids: &[String],
        policy_id: PolicyId,
    ) -> AdminResult<Vec<ClientPolicyMapping>> {
        let mut seen = HashSet::new();
        let targets: Vec<String> = client_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .map(str::to_string)
            .collect();
        if targets.is_empty() {
            return Err(AdminError::validation("at least one clientId is required"));
        }
        self.existing(policy_id).await?;

        let now = now_utc();
        let mut mappings = Vec::with_capacity(targets.len());
        for client_id in &targets {
            match self
                .storage
                .activate_mapping(client_id, policy_id, now)
                .await
            {
                Ok(mapping) => mappings.push(mapping),
                Err(e) => {
                    // Clients switched before the failure still need their caches repaired.
                    let switched: Vec<String> =
                        mappings.iter().map(|m| m.client_id.clone()).collect();
                    tracing::warn!(
                        policy_id = %policy_id,
                        client_id = %client_id,
                        switched = switched.len(),
                        error = %e,
                        "bulk assignment stopped"
                    );
                    self.invalidation.on_clients_assigned(&switched).await;
                    return Err(e.into());
                }
            }
        }
        tracing::info!(policy_id = %policy_id, clients = targets.len(), "policy assigned to clients");

        self.invalidation.on_clients_assigned(&targets).await;
        Ok(mappings)
    }

    /// Re-activates an existing mapping of `client_id` to `policy_id`.
    pub async fn activate_policy(
        &self,
        client_id: &str,
        policy_id: PolicyId,
    ) -> AdminResult<ClientPolicyMapping> {
        let client_id = require_client_id(client_id)?;
        self.existing(policy_id).await?;
        if self.storage.find_mapping(client_id, policy_id).await?.is_none() {
            return Err(AdminError::validation(format!(
                "client {client_id} is not assigned policy {policy_id}"
            )));
        }

        let mapping = self
            .storage
            .activate_mapping(client_id, policy_id, now_utc())
            .await?;
        tracing::info!(client_id = %client_id, policy_id = %policy_id, "policy activated");

        self.invalidation
            .on_clients_assigned(&[client_id.to_string()])
            .await;
        Ok(mapping)
    }

    /// Deletes a policy and its mappings. Returns false when it did not exist.
    pub async fn delete_policy(&self, id: PolicyId) -> AdminResult<bool> {
        let Some(existing) = self.storage.get_policy(id).await? else {
            return Ok(false);
        };
        if existing.is_default {
            return Err(AdminError::DefaultPolicyImmutable(id));
        }

        let affected = self.invalidation.affected_clients(id).await?;
        let deleted = self.delete_policy_rows(id).await;
        // Mapping rows may be gone even when a later step failed.
        self.invalidation.on_policy_deleted(id, &affected).await;
        let deleted = deleted?;
        if deleted {
            tracing::info!(policy_id = %id, clients = affected.len(), "policy deleted");
        }
        Ok(deleted)
    }

    async fn delete_policy_rows(&self, id: PolicyId) -> AdminResult<bool> {
        let mappings = self.storage.delete_mappings_for_policy(id).await?;
        tracing::debug!(policy_id = %id, mappings, "policy mappings deleted");
        Ok(self.storage.delete_policy(id).await?)
    }

    pub async fn get_policy(&self, id: PolicyId) -> AdminResult<Option<Policy>> {
        Ok(self.storage.get_policy(id).await?)
    }

    /// Every policy id mapped to `client_id`, active or not.
    pub async fn client_policy_ids(&self, client_id: &str) -> AdminResult<Vec<PolicyId>> {
        let client_id = require_client_id(client_id)?;
        Ok(self.storage.policy_ids_for_client(client_id).await?)
    }

    pub async fn effective_policy(&self, client_id: &str) -> AdminResult<Option<Policy>> {
        let client_id = require_client_id(client_id)?;
        Ok(self.resolver.get_effective_policy(client_id).await?)
    }

    pub async fn effective_policy_hash(&self, client_id: &str) -> AdminResult<Option<String>> {
        let client_id = require_client_id(client_id)?;
        Ok(self.resolver.get_policy_hash(client_id).await?)
    }

    async fn existing(&self, id: PolicyId) -> AdminResult<Policy> {
        self.storage
            .get_policy(id)
            .await?
            .ok_or(AdminError::PolicyNotFound(id))
    }

    async fn existing_mutable(&self, id: PolicyId) -> AdminResult<Policy> {
        let policy = self.existing(id).await?;
        if policy.is_default {
            return Err(AdminError::DefaultPolicyImmutable(id));
        }
        Ok(policy)
    }
}
