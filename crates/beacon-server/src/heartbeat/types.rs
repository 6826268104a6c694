//! Heartbeat wire types (JSON, camelCase, nulls omitted).

use beacon_core::{Policy, PolicyId, PolicyStatus, epoch_millis, format_timestamp, now_utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub current_policies_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_policy_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_policy_update_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,
}

impl HeartbeatRequest {
    pub fn new(client_id: impl Into<String>, current_policies_hash: Option<&str>) -> Self {
        Self {
            client_id: client_id.into(),
            current_policies_hash: current_policies_hash.map(str::to_string),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    NewPolicy,
    PolicyUpdated,
    /// Reserved for clients that distinguish activations; not emitted.
    PolicyActivated,
    /// Reserved for clients that distinguish the default policy; not emitted.
    DefaultPolicy,
    UpToDate,
    NoPolicy,
    InvalidClient,
    Error,
}

/// Policy body sent to a client that needs an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyPayload {
    pub id: PolicyId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: PolicyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub priority: i32,
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<&Policy> for PolicyPayload {
    fn from(policy: &Policy) -> Self {
        Self {
            id: policy.id,
            name: policy.name.clone(),
            description: policy.description.clone(),
            status: policy.status,
            version: policy.version.clone(),
            priority: policy.priority,
            is_default: policy.is_default,
            updated_at: format_timestamp(policy.updated_at).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub needs_policy_update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_policies_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_type: Option<UpdateType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_policy: Option<PolicyPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub server_timestamp: i64,
}

impl HeartbeatResponse {
    fn base(update_type: UpdateType, message: impl Into<String>) -> Self {
        Self {
            needs_policy_update: false,
            latest_policies_hash: None,
            update_type: Some(update_type),
            effective_policy: None,
            message: Some(message.into()),
            server_timestamp: epoch_millis(now_utc()),
        }
    }

    pub fn invalid_client() -> Self {
        Self::base(UpdateType::InvalidClient, "clientId is required")
    }

    pub fn no_policy() -> Self {
        Self::base(UpdateType::NoPolicy, "no policy assigned and no default policy")
    }

    pub fn up_to_date(hash: String) -> Self {
        Self {
            latest_policies_hash: Some(hash),
            ..Self::base(UpdateType::UpToDate, "policy is up to date")
        }
    }

    /// `NewPolicy` or `PolicyUpdated`, carrying the new hash and policy body.
    pub fn update(update_type: UpdateType, hash: String, policy: &Policy) -> Self {
        let message = match update_type {
            UpdateType::NewPolicy => "new policy available",
            _ => "policy has changed",
        };
        Self {
            needs_policy_update: true,
            latest_policies_hash: Some(hash),
            effective_policy: Some(PolicyPayload::from(policy)),
            ..Self::base(update_type, message)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::base(UpdateType::Error, message)
    }
}
