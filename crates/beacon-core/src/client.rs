//! Known client records, as tracked by the liveness side of heartbeats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineStatus {
    Online,
    #[default]
    Offline,
}

impl OnlineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnlineStatus::Online => "online",
            OnlineStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for OnlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnlineStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(OnlineStatus::Online),
            "offline" => Ok(OnlineStatus::Offline),
            other => Err(CoreError::InvalidOnlineStatus(other.to_string())),
        }
    }
}

/// A managed client host. Heartbeats identify it by MAC address or by numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: i64,
    pub hostname: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub online_status: OnlineStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ClientRecord {
    pub fn new(id: i64, hostname: impl Into<String>, mac_address: Option<String>) -> Self {
        Self {
            id,
            hostname: hostname.into(),
            mac_address,
            online_status: OnlineStatus::Offline,
            last_seen_at: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online_status == OnlineStatus::Online
    }
}
