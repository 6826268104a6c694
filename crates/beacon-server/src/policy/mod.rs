//! Effective-policy resolution, change hashing, administration and cache repair.

pub mod admin;
pub mod fields;
pub mod hash;
pub mod invalidation;
pub mod resolver;

pub use admin::{PolicyAdminService, PolicyDraft};
pub use hash::policy_hash;
pub use invalidation::CacheInvalidationCoordinator;
pub use resolver::{PolicyResolver, hash_key, policy_key};
