//! Store metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single buffered store
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Records currently pending
    pending: AtomicUsize,
    /// Total records accepted by append
    appended_count: AtomicU64,
    /// Total records persisted by successful flushes
    flushed_count: AtomicU64,
    /// Successful non-empty flushes
    flush_count: AtomicU64,
    /// Failed flush attempts (sink error or timeout)
    failure_count: AtomicU64,
}

impl StoreMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn set_pending(&self, len: usize) {
        self.pending.store(len, Ordering::Relaxed);
    }

    pub fn appended_count(&self) -> u64 {
        self.appended_count.load(Ordering::Relaxed)
    }

    pub fn add_appended(&self, count: usize) {
        self.appended_count.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn flushed_count(&self) -> u64 {
        self.flushed_count.load(Ordering::Relaxed)
    }

    /// Record one successful flush of `count` records
    pub fn record_flush(&self, count: usize) {
        self.flushed_count.fetch_add(count as u64, Ordering::Relaxed);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            pending: self.pending(),
            appended_count: self.appended_count(),
            flushed_count: self.flushed_count(),
            flush_count: self.flush_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Snapshot of store metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreMetricsSnapshot {
    pub pending: usize,
    pub appended_count: u64,
    pub flushed_count: u64,
    pub flush_count: u64,
    pub failure_count: u64,
}
