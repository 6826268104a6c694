//! In-memory storage backend for the Beacon policy server.
//!
//! This crate provides an in-memory implementation of the `BeaconStorage`
//! trait from `beacon-storage`, using papaya lock-free HashMaps for policy and
//! client rows and a sharded DashMap for per-client mapping rows.
//!
//! # Example
//!
//! ```ignore
//! use beacon_db_memory::InMemoryStorage;
//! use beacon_storage::BeaconStorage;
//!
//! let storage = InMemoryStorage::new();
//! let default = storage.find_default_policy().await?;
//! ```

pub mod storage;

pub use beacon_storage::{BeaconStorage, DynStorage, StorageError};
pub use storage::InMemoryStorage;

/// Creates a new shareable in-memory storage instance.
pub fn create_storage() -> DynStorage {
    std::sync::Arc::new(InMemoryStorage::new())
}
