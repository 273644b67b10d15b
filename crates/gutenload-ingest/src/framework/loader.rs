//! Batch loader
//!
//! The single consumer of the aggregator. It owns the in-memory batch and
//! the flush clock, and decides when accumulated records are handed to the
//! storage sink:
//!
//! 1. drain queued progress ticks into the counters
//! 2. drain queued records into the batch, never past `batch_size`
//! 3. flush when the batch is full, or when it is non-empty and older than
//!    `flush_interval`
//! 4. otherwise sleep for `poll_interval` and poll again
//!
//! The loop ends once every expected tick has arrived, or once all workers
//! are gone and the channels are empty. Whatever is left is then flushed.
//!
//! A failed flush drops its records and the loop carries on; losing one
//! batch is preferred over aborting the run.

use gutenload_common::FetchedRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::aggregator::AggregatorReceiver;
use super::stats::{PipelineProgress, PipelineStats};
use super::storage::StorageSink;

/// Size and age thresholds for flushing a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    pub batch_size: usize,
    pub flush_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// Batch reached `batch_size`
    Size,
    /// Non-empty batch older than `flush_interval`
    Interval,
    /// Remainder after all items were processed
    Final,
}

impl FlushReason {
    pub fn as_str(&self) -> &str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Interval => "interval",
            FlushReason::Final => "final",
        }
    }
}

impl FlushPolicy {
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            batch_size,
            flush_interval,
        }
    }

    /// Decide whether a batch of `len` records, last flushed `since_flush`
    /// ago, must be flushed now
    pub fn should_flush(&self, len: usize, since_flush: Duration) -> Option<FlushReason> {
        if len >= self.batch_size {
            Some(FlushReason::Size)
        } else if len > 0 && since_flush > self.flush_interval {
            Some(FlushReason::Interval)
        } else {
            None
        }
    }
}

/// Single-consumer accumulate-and-flush loop
pub struct BatchLoader<S: StorageSink + ?Sized> {
    sink: Arc<S>,
    policy: FlushPolicy,
    poll_interval: Duration,
    expected_items: u64,
    progress_log_every: u64,
    stats: Arc<PipelineStats>,
}

impl<S: StorageSink + ?Sized> BatchLoader<S> {
    pub fn new(
        sink: Arc<S>,
        policy: FlushPolicy,
        poll_interval: Duration,
        expected_items: u64,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sink,
            policy,
            poll_interval,
            expected_items,
            progress_log_every: 100,
            stats,
        }
    }

    pub fn with_progress_log_every(mut self, every: u64) -> Self {
        self.progress_log_every = every.max(1);
        self
    }

    /// Run until all expected items are processed or the producers are gone
    pub async fn run(self, mut receiver: AggregatorReceiver) -> PipelineProgress {
        let mut batch: Vec<FetchedRecord> = Vec::with_capacity(self.policy.batch_size);
        let mut last_flush = Instant::now();

        loop {
            let ticks = receiver.drain_ticks();
            if ticks.total() > 0 {
                let before = self.stats.processed();
                let processed = self.stats.record_ticks(ticks);
                self.log_progress(before, processed);
            }

            receiver.drain_records(&mut batch, self.policy.batch_size);

            if let Some(reason) = self.policy.should_flush(batch.len(), last_flush.elapsed()) {
                self.flush(&mut batch, reason).await;
                last_flush = Instant::now();
                if reason == FlushReason::Size {
                    continue;
                }
            }

            if self.stats.processed() >= self.expected_items || receiver.is_exhausted() {
                break;
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        // Records always precede their tick, so anything still queued
        // belongs to an item that has already been counted.
        loop {
            receiver.drain_records(&mut batch, self.policy.batch_size);
            if batch.len() < self.policy.batch_size {
                break;
            }
            self.flush(&mut batch, FlushReason::Size).await;
        }

        if !batch.is_empty() {
            self.flush(&mut batch, FlushReason::Final).await;
        }

        let progress = self.stats.snapshot();
        info!(
            processed = progress.processed,
            total = progress.total,
            succeeded = progress.succeeded,
            stored = progress.records_stored,
            failed_flushes = progress.failed_flushes,
            dropped = progress.records_dropped,
            "Batch loader finished"
        );
        progress
    }

    /// Hand the batch to the sink and clear it, whatever the outcome
    async fn flush(&self, batch: &mut Vec<FetchedRecord>, reason: FlushReason) {
        let records = std::mem::take(batch);
        let count = records.len();
        debug!(records = count, reason = reason.as_str(), "Flushing batch");

        match self.sink.insert_batch(&records).await {
            Ok(stored) => {
                self.stats.record_flush(stored);
                info!(
                    stored,
                    reason = reason.as_str(),
                    total_stored = self.stats.snapshot().records_stored,
                    "Batch stored"
                );
            },
            Err(e) => {
                self.stats.record_failed_flush(count as u64);
                error!(
                    records = count,
                    reason = reason.as_str(),
                    sink = self.sink.sink_name(),
                    error = %e,
                    "Batch flush failed, records dropped"
                );
            },
        }

        batch.reserve(self.policy.batch_size);
    }

    fn log_progress(&self, before: u64, processed: u64) {
        if before / self.progress_log_every == processed / self.progress_log_every {
            return;
        }

        let progress = self.stats.snapshot();
        info!(
            processed,
            total = self.expected_items,
            succeeded = progress.succeeded,
            percent = %format_args!("{:.1}", progress.completion_percentage()),
            "Progress"
        );
    }
}
