//! Policy cache with transparent fallback.
//!
//! ## Architecture
//!
//! - **Distributed (Redis)**: shared across instances, reached through [`DistributedCache`]
//! - **Local (DashMap)**: per-instance fallback with TTL and a background sweeper
//! - **Probe**: debounced reachability check deciding which of the two serves a call
//!
//! ## Graceful Degradation
//!
//! If Redis is disabled, unreachable, or fails a single call, the call is
//! served by the local cache. Callers never see cache errors.

pub mod availability;
pub mod backend;
pub mod dynamic;
pub mod local;
pub mod read_through;
pub mod redis_cache;

pub use availability::CacheAvailabilityProbe;
pub use backend::{CacheError, CacheMode, DistributedCache, FieldMap};
pub use dynamic::{CacheSelfTest, CacheStatusReport, DynamicCache};
pub use local::LocalCache;
pub use read_through::read_through;
pub use redis_cache::RedisCache;
