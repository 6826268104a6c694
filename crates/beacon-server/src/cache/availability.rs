//! Debounced reachability probe for the distributed cache.
//!
//! The probe piggybacks on callers: [`CacheAvailabilityProbe::is_available`]
//! only touches the network when the last check is older than the configured
//! interval, and concurrent callers past that interval elect a single prober.
//! Everyone else reads the last known answer.

use super::backend::DistributedCache;
use crate::clock::Clock;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Key read by the existence probe. Never written.
pub const PROBE_KEY: &str = "__cache_availability_probe__";

pub struct CacheAvailabilityProbe {
    backend: Option<Arc<dyn DistributedCache>>,
    interval: Duration,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    last_check: Mutex<Option<Instant>>,
    status: ArcSwap<String>,
    probes: AtomicU64,
}

impl CacheAvailabilityProbe {
    /// Starts out unavailable; the first `is_available` call probes.
    pub fn new(
        backend: Option<Arc<dyn DistributedCache>>,
        interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let status = if backend.is_some() {
            "distributed cache not checked yet"
        } else {
            "distributed cache not configured, using local cache"
        };
        Self {
            backend,
            interval,
            clock,
            available: AtomicBool::new(false),
            last_check: Mutex::new(None),
            status: ArcSwap::from_pointee(status.to_string()),
            probes: AtomicU64::new(0),
        }
    }

    /// Last known availability, re-probed when the debounce interval has passed.
    pub async fn is_available(&self) -> bool {
        if self.claim_check() {
            self.probe().await;
        }
        self.available.load(Ordering::Acquire)
    }

    /// Probes immediately, regardless of the debounce interval.
    pub async fn refresh(&self) -> bool {
        *self.last_check.lock() = Some(self.clock.now());
        self.probe().await;
        self.available.load(Ordering::Acquire)
    }

    /// Human-readable description of the last probe outcome.
    pub fn status(&self) -> String {
        self.status.load().as_ref().clone()
    }

    /// Number of probes sent to the backend so far.
    pub fn probe_count(&self) -> u64 {
        self.probes.load(Ordering::Relaxed)
    }

    // Marks a check as started when one is due; only the caller that gets
    // `true` back probes.
    fn claim_check(&self) -> bool {
        let now = self.clock.now();
        let mut last = self.last_check.lock();
        let due = match *last {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.interval,
        };
        if due {
            *last = Some(now);
        }
        due
    }

    async fn probe(&self) {
        let Some(backend) = &self.backend else {
            return;
        };
        self.probes.fetch_add(1, Ordering::Relaxed);

        let (available, status) = match backend.exists(PROBE_KEY).await {
            Ok(_) => (true, format!("{} cache reachable", backend.name())),
            Err(e) => {
                tracing::debug!(backend = backend.name(), error = %e, "cache probe failed");
                (false, format!("{} cache unreachable: {e}", backend.name()))
            }
        };
        self.status.store(Arc::new(status));

        let previous = self.available.swap(available, Ordering::AcqRel);
        match (previous, available) {
            (false, true) => {
                tracing::info!(backend = backend.name(), "distributed cache available")
            }
            (true, false) => tracing::warn!(
                backend = backend.name(),
                "distributed cache unavailable, falling back to local cache"
            ),
            _ => {}
        }
    }
}

impl std::fmt::Debug for CacheAvailabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAvailabilityProbe")
            .field("configured", &self.backend.is_some())
            .field("available", &self.available.load(Ordering::Relaxed))
            .field("interval", &self.interval)
            .finish()
    }
}
