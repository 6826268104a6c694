//! Client liveness: last-seen bookkeeping on heartbeat and offline detection.

use crate::tasks::WorkerPool;
use beacon_core::{ClientRecord, OnlineStatus, now_utc};
use beacon_storage::{DynStorage, StorageResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// What a liveness update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessOutcome {
    UnknownClient,
    /// Already online; only last-seen moved.
    Touched,
    CameOnline,
}

/// Records heartbeats against client rows on a dedicated worker pool.
pub struct LivenessRecorder {
    storage: DynStorage,
    pool: WorkerPool,
    slow_threshold: Duration,
}

impl LivenessRecorder {
    pub fn new(storage: DynStorage, pool: WorkerPool, slow_threshold: Duration) -> Self {
        Self {
            storage,
            pool,
            slow_threshold,
        }
    }

    /// Queues a liveness update and returns immediately.
    pub fn record(self: &Arc<Self>, client_id: &str) -> bool {
        let recorder = Arc::clone(self);
        let client_id = client_id.to_string();
        self.pool.submit(async move {
            if let Err(e) = recorder.mark_online(&client_id).await {
                tracing::warn!(
                    client_id = %client_id,
                    category = %e.category(),
                    error = %e,
                    "liveness update failed"
                );
            }
        })
    }

    /// Resolves the client and marks it seen. The online flag and
    /// `updated_at` are written only when the client was offline.
    pub async fn mark_online(&self, client_id: &str) -> StorageResult<LivenessOutcome> {
        let started = Instant::now();
        let Some(client) = self.find_client(client_id).await? else {
            tracing::debug!(client_id = %client_id, "heartbeat from unknown client");
            return Ok(LivenessOutcome::UnknownClient);
        };

        let now = now_utc();
        let outcome = if client.is_online() {
            self.storage.touch_client(client.id, now).await?;
            LivenessOutcome::Touched
        } else {
            self.storage
                .update_client_status(client.id, OnlineStatus::Online, now)
                .await?;
            tracing::info!(client_id = %client_id, record_id = client.id, "client online");
            LivenessOutcome::CameOnline
        };

        let elapsed = started.elapsed();
        if elapsed > self.slow_threshold {
            tracing::warn!(
                client_id = %client_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "slow liveness update"
            );
        }
        Ok(outcome)
    }

    // MAC address first, then the numeric record id
    async fn find_client(&self, client_id: &str) -> StorageResult<Option<ClientRecord>> {
        if let Some(client) = self.storage.find_client_by_mac(client_id).await? {
            return Ok(Some(client));
        }
        match client_id.parse::<i64>() {
            Ok(id) => self.storage.get_client(id).await,
            Err(_) => Ok(None),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineStatistics {
    pub online: usize,
    pub offline: usize,
    pub total: usize,
}

/// Marks clients offline once their heartbeats stop.
pub struct OfflineMonitor {
    storage: DynStorage,
    offline_after: Duration,
}

impl OfflineMonitor {
    pub fn new(storage: DynStorage, offline_after: Duration) -> Self {
        Self {
            storage,
            offline_after,
        }
    }

    /// One pass: every online client silent for longer than `offline_after`
    /// goes offline. Returns how many were changed.
    pub async fn sweep(&self) -> StorageResult<usize> {
        let now = now_utc();
        let threshold = now - self.offline_after;
        let stale = self.storage.find_stale_online_clients(threshold).await?;

        let mut changed = 0;
        for client in &stale {
            if self
                .storage
                .update_client_status(client.id, OnlineStatus::Offline, now)
                .await?
            {
                changed += 1;
                tracing::info!(record_id = client.id, hostname = %client.hostname, "client offline");
            }
        }
        if changed > 0 {
            tracing::info!(changed, "offline sweep finished");
        }
        Ok(changed)
    }

    pub async fn online_statistics(&self) -> StorageResult<OnlineStatistics> {
        let online = self
            .storage
            .count_clients(Some(OnlineStatus::Online))
            .await?;
        let total = self.storage.count_clients(None).await?;
        Ok(OnlineStatistics {
            online,
            offline: total.saturating_sub(online),
            total,
        })
    }

    /// Runs [`sweep`](Self::sweep) every `period`, starting one period from now.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    tracing::warn!(error = %e, "offline sweep failed");
                }
            }
        })
    }
}
