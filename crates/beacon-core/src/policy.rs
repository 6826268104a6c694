//! Policy and client-to-policy assignment model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::CoreError;

/// Opaque numeric policy identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub i64);

impl PolicyId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PolicyId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(PolicyId)
            .map_err(|_| CoreError::invalid_policy_id(s))
    }
}

impl From<i64> for PolicyId {
    fn from(value: i64) -> Self {
        PolicyId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    #[default]
    Enabled,
    Disabled,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Enabled => "enabled",
            PolicyStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(PolicyStatus::Enabled),
            "disabled" => Ok(PolicyStatus::Disabled),
            other => Err(CoreError::invalid_status(other)),
        }
    }
}

/// A named configuration bundle that can be assigned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: PolicyStatus,
    /// Mutable version token, restamped on every content change.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    /// Higher wins. Admin metadata only; effective-policy resolution ignores it.
    #[serde(default)]
    pub priority: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Policy {
    pub fn is_enabled(&self) -> bool {
        self.status == PolicyStatus::Enabled
    }

    /// Whether an active assignment to this policy can override the default.
    pub fn can_override_default(&self) -> bool {
        self.is_enabled() && !self.is_default
    }
}

/// Assignment of a policy to a client id.
///
/// At most one mapping per client has `is_active = true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPolicyMapping {
    pub id: i64,
    pub client_id: String,
    pub policy_id: PolicyId,
    #[serde(with = "time::serde::rfc3339")]
    pub assigned_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub activated_at: Option<OffsetDateTime>,
    pub is_active: bool,
}
