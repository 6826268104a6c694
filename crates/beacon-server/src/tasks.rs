//! Bounded background worker pools.
//!
//! Jobs are futures pushed onto a bounded channel and drained by a fixed set
//! of tokio tasks. Submission never waits: when the queue is full the job is
//! dropped and logged. A panicking job is caught and logged; the worker keeps
//! running.

use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Half the available CPUs, never fewer than two.
pub fn default_worker_count() -> usize {
    (num_cpus::get() / 2).max(2)
}

#[derive(Debug, Default)]
struct PoolCounters {
    pending: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time counters of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub pending: usize,
    pub completed: u64,
    pub panicked: u64,
    pub rejected: u64,
}

#[derive(Clone)]
pub struct WorkerPool {
    name: &'static str,
    workers: usize,
    sender: mpsc::Sender<Job>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Spawns `workers` tasks on the current tokio runtime.
    pub fn new(name: &'static str, workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());

        for worker in 0..workers {
            let receiver = Arc::clone(&receiver);
            let counters = Arc::clone(&counters);
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        break;
                    };
                    if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
                        counters.panicked.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            pool = name,
                            worker,
                            panic = panic_message(panic.as_ref()),
                            "background job panicked"
                        );
                    } else {
                        counters.completed.fetch_add(1, Ordering::Relaxed);
                    }
                    counters.pending.fetch_sub(1, Ordering::AcqRel);
                }
                tracing::debug!(pool = name, worker, "worker stopped");
            });
        }
        tracing::debug!(pool = name, workers, capacity, "worker pool started");

        Self {
            name,
            workers,
            sender,
            counters,
        }
    }

    /// Queues `job` without waiting. Returns false when it was dropped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        match self.sender.try_send(Box::pin(job)) {
            Ok(()) => true,
            Err(e) => {
                self.counters.pending.fetch_sub(1, Ordering::AcqRel);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "pool closed",
                };
                tracing::warn!(pool = self.name, reason, "dropping background job");
                false
            }
        }
    }

    /// Waits until every accepted job has finished, up to `timeout`.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.counters.pending.load(Ordering::Acquire) > 0 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .is_ok()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers,
            pending: self.counters.pending.load(Ordering::Acquire),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
