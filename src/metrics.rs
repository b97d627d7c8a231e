//! Three named counters: `SQLLayerRowsFetched`,
//! `SQLLayerRowsStored`, `SQLLayerRowsCleared`. Plain `AtomicU64`s rather
//! than a metrics-crate registration, since the surrounding metrics service
//! is an external collaborator this core only increments into.

use std::sync::atomic::AtomicU64;

#[derive(Debug, Default)]
pub struct Metrics {
    pub rows_fetched: AtomicU64,
    pub rows_stored: AtomicU64,
    pub rows_cleared: AtomicU64,
}

impl Metrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        use std::sync::atomic::Ordering::Relaxed;
        MetricsSnapshot {
            rows_fetched: self.rows_fetched.load(Relaxed),
            rows_stored: self.rows_stored.load(Relaxed),
            rows_cleared: self.rows_cleared.load(Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rows_fetched: u64,
    pub rows_stored: u64,
    pub rows_cleared: u64,
}
