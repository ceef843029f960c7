//! Advisory request counters. Nothing in the pipeline reads them back.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Observer for request activity, supplied when the client is constructed.
pub trait DownloadStatistics: Send + Sync {
    fn increment_total_requests(&self, count: u64);
    /// Positive when a request starts, negative when it finishes.
    fn adjust_active_requests(&self, delta: i64);
}

/// Lock-free counters implementing [`DownloadStatistics`].
#[derive(Debug, Default)]
pub struct RequestCounters {
    total: AtomicU64,
    active: AtomicI64,
}

impl RequestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_requests(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn active_requests(&self) -> i64 {
        self.active.load(Ordering::Relaxed)
    }
}

impl DownloadStatistics for RequestCounters {
    fn increment_total_requests(&self, count: u64) {
        self.total.fetch_add(count, Ordering::Relaxed);
    }

    fn adjust_active_requests(&self, delta: i64) {
        self.active.fetch_add(delta, Ordering::Relaxed);
    }
}
