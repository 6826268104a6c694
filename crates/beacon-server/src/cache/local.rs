//! In-process fallback cache.
//!
//! Field maps live in a [`DashMap`] keyed by the top-level cache key, with one
//! expiry per key. Every mutation goes through DashMap's per-shard entry API,
//! so concurrent writers to the same key never race a read-modify-write.
//! Expired entries are removed lazily on read and by a periodic sweeper.

use super::backend::FieldMap;
use crate::clock::Clock;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct LocalEntry {
    fields: FieldMap,
    expires_at: Instant,
}

impl LocalEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

pub struct LocalCache {
    entries: DashMap<String, LocalEntry>,
    clock: Arc<dyn Clock>,
    expired_removed: AtomicU64,
}

impl LocalCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            expired_removed: AtomicU64::new(0),
        }
    }

    /// Returns a copy of the live map under `key`, or an empty map.
    pub fn get_map(&self, key: &str) -> FieldMap {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key)
            && entry.is_live(now)
        {
            return entry.fields.clone();
        }
        self.remove_if_expired(key, now);
        FieldMap::new()
    }

    /// Replaces the map under `key`.
    pub fn put_map(&self, key: &str, fields: FieldMap, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries
            .insert(key.to_string(), LocalEntry { fields, expires_at });
    }

    pub fn get_field(&self, key: &str, field: &str) -> Option<String> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(key)
            && entry.is_live(now)
        {
            return entry.fields.get(field).cloned();
        }
        self.remove_if_expired(key, now);
        None
    }

    /// Merges one field into the live map under `key`, or starts a fresh one.
    /// The key's expiry is reset either way.
    pub fn put_field(&self, key: &str, field: &str, value: &str, ttl: Duration) {
        let now = self.clock.now();
        let expires_at = now + ttl;
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if !entry.is_live(now) {
                    entry.fields.clear();
                }
                entry.fields.insert(field.to_string(), value.to_string());
                entry.expires_at = expires_at;
            }
            Entry::Vacant(vacant) => {
                let mut fields = FieldMap::with_capacity(1);
                fields.insert(field.to_string(), value.to_string());
                vacant.insert(LocalEntry { fields, expires_at });
            }
        }
    }

    /// Removes `key`; returns whether anything was stored under it.
    pub fn evict(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.expired_removed
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Number of stored keys, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entries removed because their TTL passed.
    pub fn expired_removed(&self) -> u64 {
        self.expired_removed.load(Ordering::Relaxed)
    }

    /// Starts the periodic sweep. The task stops once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    tracing::debug!("local cache dropped, stopping sweeper");
                    break;
                };
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.len(), "local cache sweep");
                }
            }
        })
    }

    fn remove_if_expired(&self, key: &str, now: Instant) {
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_live(now))
            .is_some()
        {
            self.expired_removed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
