use thiserror::Error;

/// Core error types for Beacon domain values
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid policy status: {0}")]
    InvalidStatus(String),

    #[error("Invalid online status: {0}")]
    InvalidOnlineStatus(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid policy id: {0}")]
    InvalidPolicyId(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),
}

impl CoreError {
    /// Create a new InvalidStatus error
    pub fn invalid_status(status: impl Into<String>) -> Self {
        Self::InvalidStatus(status.into())
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp(value.into())
    }

    /// Create a new InvalidPolicyId error
    pub fn invalid_policy_id(value: impl Into<String>) -> Self {
        Self::InvalidPolicyId(value.into())
    }

    /// Check if this error was caused by caller-supplied input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidStatus(_)
                | Self::InvalidOnlineStatus(_)
                | Self::InvalidTimestamp(_)
                | Self::InvalidPolicyId(_)
                | Self::JsonError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
