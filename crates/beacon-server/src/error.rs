use beacon_core::{CoreError, PolicyId};
use beacon_storage::StorageError;
use thiserror::Error;

/// Errors returned by policy administration operations.
///
/// `Validation` and the default-policy variants are rejections of the
/// request itself; `Storage` wraps failures of the backing store.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("policy not found: {0}")]
    PolicyNotFound(PolicyId),

    #[error("default policy {0} cannot be modified")]
    DefaultPolicyImmutable(PolicyId),

    #[error("a default policy already exists")]
    DefaultPolicyExists,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AdminError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for rejected requests, false for backend failures.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

impl From<CoreError> for AdminError {
    fn from(e: CoreError) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type AdminResult<T> = Result<T, AdminError>;
