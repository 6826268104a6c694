pub mod bootstrap;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod observability;
pub mod policy;
pub mod server;
pub mod tasks;

use std::sync::Arc;

pub use cache::{CacheMode, DistributedCache, DynamicCache, RedisCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, CacheConfig, RedisConfig};
pub use error::{AdminError, AdminResult};
pub use heartbeat::{HeartbeatCoordinator, HeartbeatRequest, HeartbeatResponse, UpdateType};
pub use observability::{apply_logging_level, init_tracing, init_tracing_with_level};
pub use policy::{
    CacheInvalidationCoordinator, PolicyAdminService, PolicyDraft, PolicyResolver, policy_hash,
};
pub use server::{AppState, build_services, build_services_with};
pub use tasks::WorkerPool;

/// Create the distributed cache backend based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: Returns `None`; every call uses the local cache
/// - **Redis enabled**: Returns the Redis backend even if Redis is down right now
///
/// ## Graceful Degradation
///
/// Reachability is not tested here. The availability probe checks it on its
/// own schedule, so Redis can come and go while the server keeps running.
pub fn create_distributed_cache(config: &RedisConfig) -> Option<Arc<dyn DistributedCache>> {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return None;
    }

    tracing::info!(url = %config.url, "Configuring Redis policy cache");
    match RedisCache::from_config(config) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            None
        }
    }
}
