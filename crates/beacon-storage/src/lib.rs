//! # beacon-storage
//!
//! Storage abstraction layer for the Beacon policy server.
//!
//! This crate defines the contract the policy subsystem consumes from its
//! relational store. It does not contain any implementations - those are
//! provided by separate crates (`beacon-db-memory`, or an SQL backend).
//!
//! ## Overview
//!
//! The main trait is [`BeaconStorage`], covering:
//! - Keyed CRUD on policies and client records
//! - Filtered lookups and counts on client policy mappings
//! - Atomic per-client activation (deactivate all, then activate one)
//!
//! ## Example
//!
//! ```ignore
//! use beacon_storage::{BeaconStorage, StorageError};
//!
//! async fn active_policy_id(
//!     storage: &dyn BeaconStorage,
//!     client_id: &str,
//! ) -> Result<Option<i64>, StorageError> {
//!     let mapping = storage.find_active_mapping(client_id).await?;
//!     Ok(mapping.map(|m| m.policy_id.get()))
//! }
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::BeaconStorage;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStorage = std::sync::Arc<dyn BeaconStorage>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::BeaconStorage;
    pub use crate::{DynStorage, StorageResult};
}
