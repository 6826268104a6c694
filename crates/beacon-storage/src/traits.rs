//! Storage traits for the Beacon storage abstraction layer.

use async_trait::async_trait;
use beacon_core::{ClientPolicyMapping, ClientRecord, OnlineStatus, Policy, PolicyId};
use time::OffsetDateTime;

use crate::error::StorageError;

/// The store contract consumed by the policy subsystem.
///
/// Implementations must be thread-safe (`Send + Sync`). Every method maps to a
/// single keyed or filtered statement on the relational side, except
/// [`activate_mapping`](BeaconStorage::activate_mapping), which is one unit of
/// work per call.
#[async_trait]
pub trait BeaconStorage: Send + Sync {
    // ==================== Policies ====================

    /// Reads a policy by id. Returns `None` if it does not exist.
    async fn get_policy(&self, id: PolicyId) -> Result<Option<Policy>, StorageError>;

    /// Reads the policy flagged `is_default`, if any.
    async fn find_default_policy(&self) -> Result<Option<Policy>, StorageError>;

    /// Counts policies flagged `is_default`.
    async fn count_default_policies(&self) -> Result<usize, StorageError>;

    /// Inserts a new policy.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the id is taken.
    async fn insert_policy(&self, policy: &Policy) -> Result<(), StorageError>;

    /// Replaces an existing policy row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the policy does not exist.
    async fn update_policy(&self, policy: &Policy) -> Result<(), StorageError>;

    /// Deletes a policy by id. Returns `false` if nothing was deleted.
    async fn delete_policy(&self, id: PolicyId) -> Result<bool, StorageError>;

    // ==================== Client policy mappings ====================

    /// Returns the active mapping for a client, newest `activated_at` first.
    async fn find_active_mapping(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientPolicyMapping>, StorageError>;

    /// Returns the mapping for a (client, policy) pair.
    async fn find_mapping(
        &self,
        client_id: &str,
        policy_id: PolicyId,
    ) -> Result<Option<ClientPolicyMapping>, StorageError>;

    /// Deactivates every mapping of `client_id`, then activates (creating it
    /// if needed) the mapping to `policy_id`, as one unit of work.
    ///
    /// Concurrent calls for the same client never interleave between the
    /// deactivate and activate steps.
    async fn activate_mapping(
        &self,
        client_id: &str,
        policy_id: PolicyId,
        at: OffsetDateTime,
    ) -> Result<ClientPolicyMapping, StorageError>;

    /// Distinct client ids mapped to a policy (active or not).
    async fn client_ids_for_policy(&self, policy_id: PolicyId)
    -> Result<Vec<String>, StorageError>;

    /// Policy ids mapped to a client (active or not).
    async fn policy_ids_for_client(&self, client_id: &str) -> Result<Vec<PolicyId>, StorageError>;

    /// Deletes every mapping to a policy. Returns the number of rows removed.
    async fn delete_mappings_for_policy(&self, policy_id: PolicyId) -> Result<usize, StorageError>;

    /// Counts active mappings of a client.
    async fn count_active_mappings(&self, client_id: &str) -> Result<usize, StorageError>;

    // ==================== Clients ====================

    /// Looks a client up by its unique MAC address.
    async fn find_client_by_mac(&self, mac: &str) -> Result<Option<ClientRecord>, StorageError>;

    /// Looks a client up by numeric id.
    async fn get_client(&self, id: i64) -> Result<Option<ClientRecord>, StorageError>;

    /// Inserts a new client record.
    async fn insert_client(&self, client: &ClientRecord) -> Result<(), StorageError>;

    /// Updates only the last-seen timestamp. Returns `false` if the client is unknown.
    async fn touch_client(&self, id: i64, seen_at: OffsetDateTime) -> Result<bool, StorageError>;

    /// Updates the online flag; going online also stamps `last_seen_at`.
    /// Returns `false` if the client is unknown.
    async fn update_client_status(
        &self,
        id: i64,
        status: OnlineStatus,
        at: OffsetDateTime,
    ) -> Result<bool, StorageError>;

    /// Clients flagged online whose last-seen is older than `threshold` or absent.
    async fn find_stale_online_clients(
        &self,
        threshold: OffsetDateTime,
    ) -> Result<Vec<ClientRecord>, StorageError>;

    /// Counts clients, optionally filtered by online status.
    async fn count_clients(&self, status: Option<OnlineStatus>) -> Result<usize, StorageError>;

    // ==================== Metadata ====================

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
