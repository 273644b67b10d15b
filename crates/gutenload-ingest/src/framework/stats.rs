//! Observable pipeline counters
//!
//! Written by the batch loader, readable from any task at any time.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::aggregator::TickCounts;

#[derive(Debug, Default)]
pub struct PipelineStats {
    total: AtomicU64,
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    records_stored: AtomicU64,
    flushes: AtomicU64,
    failed_flushes: AtomicU64,
    records_dropped: AtomicU64,
}

impl PipelineStats {
    pub fn new(total: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
            ..Self::default()
        }
    }

    pub(crate) fn record_ticks(&self, ticks: TickCounts) -> u64 {
        self.succeeded.fetch_add(ticks.succeeded, Ordering::Relaxed);
        self.failed.fetch_add(ticks.failed, Ordering::Relaxed);
        self.processed.fetch_add(ticks.total(), Ordering::Relaxed) + ticks.total()
    }

    pub(crate) fn record_flush(&self, stored: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.records_stored.fetch_add(stored, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_flush(&self, dropped: u64) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.records_dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PipelineProgress {
        PipelineProgress {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub total: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Rows the storage sink reported as written
    pub records_stored: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    /// Records lost to failed flushes
    pub records_dropped: u64,
}

impl PipelineProgress {
    /// Calculate completion percentage
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}
