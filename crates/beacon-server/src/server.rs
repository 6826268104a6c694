//! Service wiring: builds every component once and owns the background tasks.

use crate::bootstrap::ensure_default_policy;
use crate::cache::{CacheAvailabilityProbe, DistributedCache, DynamicCache, LocalCache};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::heartbeat::{HeartbeatCoordinator, LivenessRecorder, OfflineMonitor};
use crate::policy::{CacheInvalidationCoordinator, PolicyAdminService, PolicyResolver};
use crate::tasks::WorkerPool;
use beacon_storage::DynStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Everything a transport layer needs to serve heartbeats and admin calls.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: DynStorage,
    pub cache: Arc<DynamicCache>,
    pub resolver: Arc<PolicyResolver>,
    pub admin: Arc<PolicyAdminService>,
    pub invalidation: Arc<CacheInvalidationCoordinator>,
    pub heartbeat: Arc<HeartbeatCoordinator>,
    pub offline_monitor: Arc<OfflineMonitor>,
    pub liveness_pool: WorkerPool,
    pub maintenance_pool: WorkerPool,
    background: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Stops periodic tasks and waits for queued background jobs.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        for task in self.background.drain(..) {
            task.abort();
        }
        let liveness = self.liveness_pool.wait_idle(timeout).await;
        let maintenance = self.maintenance_pool.wait_idle(timeout).await;
        if !(liveness && maintenance) {
            tracing::warn!("background jobs still running at shutdown");
        }
        liveness && maintenance
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage.backend_name())
            .field("cache", &self.cache)
            .field("liveness_pool", &self.liveness_pool)
            .field("maintenance_pool", &self.maintenance_pool)
            .finish()
    }
}

/// Builds the services against Redis as configured.
pub async fn build_services(config: AppConfig, storage: DynStorage) -> anyhow::Result<AppState> {
    let distributed = crate::create_distributed_cache(&config.redis);
    build_services_with(config, storage, distributed, Arc::new(SystemClock)).await
}

/// Builds the services with an explicit distributed backend and clock.
pub async fn build_services_with(
    config: AppConfig,
    storage: DynStorage,
    distributed: Option<Arc<dyn DistributedCache>>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<AppState> {
    config.validate().map_err(anyhow::Error::msg)?;
    let config = Arc::new(config);

    let probe = Arc::new(CacheAvailabilityProbe::new(
        distributed.clone(),
        config.availability_check_interval(),
        clock.clone(),
    ));
    let local = Arc::new(LocalCache::new(clock));
    let cache = Arc::new(DynamicCache::new(probe, distributed, local.clone()));
    tracing::info!(mode = %cache.current_mode().await, "policy cache ready");

    let liveness_pool = WorkerPool::new(
        "liveness",
        config.heartbeat.worker_count(),
        config.heartbeat.liveness_queue_capacity,
    );
    let maintenance_pool = WorkerPool::new(
        "maintenance",
        config.invalidation.workers,
        config.invalidation.queue_capacity,
    );

    let resolver = Arc::new(PolicyResolver::new(
        storage.clone(),
        cache.clone(),
        config.policy_ttl(),
    ));
    let invalidation = Arc::new(CacheInvalidationCoordinator::new(
        storage.clone(),
        resolver.clone(),
        maintenance_pool.clone(),
        config.rewarm_delay(),
    ));
    let admin = Arc::new(PolicyAdminService::new(
        storage.clone(),
        resolver.clone(),
        invalidation.clone(),
    ));
    let liveness = Arc::new(LivenessRecorder::new(
        storage.clone(),
        liveness_pool.clone(),
        config.slow_liveness_threshold(),
    ));
    let heartbeat = Arc::new(HeartbeatCoordinator::new(resolver.clone(), liveness));
    let offline_monitor = Arc::new(OfflineMonitor::new(storage.clone(), config.offline_after()));

    ensure_default_policy(&admin, config.bootstrap.default_policy.as_ref()).await?;

    let background = vec![
        local.spawn_sweeper(config.local_sweep_interval()),
        offline_monitor.clone().spawn(config.offline_check_interval()),
    ];

    tracing::info!(
        storage = storage.backend_name(),
        liveness_workers = liveness_pool.stats().workers,
        maintenance_workers = maintenance_pool.stats().workers,
        "beacon services started"
    );

    Ok(AppState {
        config,
        storage,
        cache,
        resolver,
        admin,
        invalidation,
        heartbeat,
        offline_monitor,
        liveness_pool,
        maintenance_pool,
        background,
    })
}
