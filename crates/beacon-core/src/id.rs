//! Numeric identifier generation.
//!
//! Ids are 63-bit, time-ordered values: milliseconds since a custom epoch in
//! the high bits, a per-millisecond sequence in the low 22 bits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 2024-01-01T00:00:00Z in epoch millis.
const CUSTOM_EPOCH_MS: u64 = 1_704_067_200_000;
const SEQUENCE_BITS: u32 = 22;

#[derive(Debug, Default)]
pub struct IdGenerator {
    /// Last issued id; the next id is always strictly greater.
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> i64 {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
            .saturating_sub(CUSTOM_EPOCH_MS);
        let candidate = now_ms << SEQUENCE_BITS;

        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            // Clock went backwards or same millisecond: keep counting from the last id.
            let next = if candidate > current {
                candidate
            } else {
                current + 1
            };
            match self
                .last
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return (next & (i64::MAX as u64)) as i64,
                Err(actual) => current = actual,
            }
        }
    }
}
