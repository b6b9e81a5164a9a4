//! Per-processor metrics
//!
//! Relaxed atomic counters tracking queue/worker health for one
//! destination. Useful for spotting a destination that is lagging, failing
//! or dropping events while its siblings are healthy.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    /// Events accepted onto the queue
    enqueued: AtomicU64,
    /// Events handed to the destination (individually or inside batches)
    processed: AtomicU64,
    /// Batch calls issued to the destination
    batches: AtomicU64,
    /// Processing attempts that failed
    failed: AtomicU64,
    /// Lag-threshold warnings emitted
    lag_warnings: AtomicU64,
    /// Events still queued when the worker stopped
    dropped_at_stop: AtomicU64,
}

impl ProcessorMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            lag_warnings: AtomicU64::new(0),
            dropped_at_stop: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lag_warnings(&self) -> u64 {
        self.lag_warnings.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_at_stop(&self) -> u64 {
        self.dropped_at_stop.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_processed(&self, count: u64) {
        self.processed.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_lag_warning(&self) {
        self.lag_warnings.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dropped_at_stop(&self, count: u64) {
        self.dropped_at_stop.fetch_add(count, Ordering::Relaxed);
    }

    /// Events accepted but not yet handed to the destination.
    pub fn backlog(&self) -> u64 {
        self.enqueued()
            .saturating_sub(self.processed())
            .saturating_sub(self.dropped_at_stop())
    }
}

impl Clone for ProcessorMetrics {
    /// Snapshot of the current counter values
    fn clone(&self) -> Self {
        Self {
            enqueued: AtomicU64::new(self.enqueued()),
            processed: AtomicU64::new(self.processed()),
            batches: AtomicU64::new(self.batches()),
            failed: AtomicU64::new(self.failed()),
            lag_warnings: AtomicU64::new(self.lag_warnings()),
            dropped_at_stop: AtomicU64::new(self.dropped_at_stop()),
        }
    }
}
