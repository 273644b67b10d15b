//! Partition workers
//!
//! Each worker walks its own partition in ascending ID order, calls the
//! fetcher once per ID and emits exactly one progress tick per ID, preceded
//! by the record when the fetch succeeded. A failing or panicking fetch only
//! affects its own item.

use futures::FutureExt;
use gutenload_common::{FetchedRecord, ItemId, ProgressTick};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::aggregator::AggregatorSender;
use super::fetcher::{FetchError, ItemFetcher};
use super::partition::Partition;

/// Outcome of one worker's run over its partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub partition: Partition,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
    /// Stopped early by cancellation; remaining IDs were not ticked
    pub cancelled: bool,
}

impl WorkerSummary {
    fn new(partition: Partition) -> Self {
        Self {
            partition,
            processed: 0,
            succeeded: 0,
            failed: 0,
            panicked: 0,
            cancelled: false,
        }
    }
}

/// Worker bound to one partition
pub struct PartitionWorker<F: ItemFetcher + ?Sized> {
    partition: Partition,
    fetcher: Arc<F>,
    sender: AggregatorSender,
    max_content_bytes: usize,
    cancel: CancellationToken,
}

impl<F: ItemFetcher + ?Sized> PartitionWorker<F> {
    pub fn new(
        partition: Partition,
        fetcher: Arc<F>,
        sender: AggregatorSender,
        max_content_bytes: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            partition,
            fetcher,
            sender,
            max_content_bytes,
            cancel,
        }
    }

    /// Process every ID in the partition
    pub async fn run(self) -> WorkerSummary {
        let mut summary = WorkerSummary::new(self.partition);

        info!(
            partition = self.partition.index,
            start = self.partition.start,
            end = self.partition.end,
            "Worker started"
        );

        for item_id in self.partition.ids() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                warn!(
                    partition = self.partition.index,
                    next_item = item_id,
                    "Worker cancelled before finishing its partition"
                );
                break;
            }

            let outcome = self.process_item(item_id).await;
            summary.processed += 1;

            let tick = match outcome {
                Ok(record) => {
                    summary.succeeded += 1;
                    self.sender.send_record(record);
                    ProgressTick::Success
                },
                Err(err) => {
                    summary.failed += 1;
                    if matches!(err, FetchError::Panicked(_)) {
                        summary.panicked += 1;
                    }
                    log_failure(item_id, &err);
                    ProgressTick::Failure
                },
            };

            if !self.sender.send_tick(tick) {
                warn!(
                    partition = self.partition.index,
                    item_id, "Batch loader is gone, stopping worker"
                );
                break;
            }
        }

        info!(
            partition = self.partition.index,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Worker finished"
        );

        summary
    }

    /// Fetch one item with panic isolation and the content bound applied
    pub async fn process_item(&self, item_id: ItemId) -> Result<FetchedRecord, FetchError> {
        let fetched = AssertUnwindSafe(self.fetcher.fetch(item_id))
            .catch_unwind()
            .await
            .map_err(|payload| FetchError::Panicked(panic_message(payload.as_ref())))?;

        fetched.map(|record| record.truncated(self.max_content_bytes))
    }
}

fn log_failure(item_id: ItemId, err: &FetchError) {
    if err.is_absent() {
        debug!(item_id, kind = err.kind(), "Item absent");
    } else {
        warn!(item_id, kind = err.kind(), error = %err, "Item fetch failed");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Fixed pool of partition workers sharing one fetcher
pub struct WorkerPool<F: ItemFetcher + ?Sized> {
    fetcher: Arc<F>,
    max_content_bytes: usize,
}

impl<F: ItemFetcher + ?Sized + 'static> WorkerPool<F> {
    pub fn new(fetcher: Arc<F>, max_content_bytes: usize) -> Self {
        Self {
            fetcher,
            max_content_bytes,
        }
    }

    /// Launch one task per partition.
    ///
    /// The pool's `sender` is consumed; once every worker finishes, all
    /// senders are dropped and the receiver observes exhaustion.
    pub fn spawn(
        &self,
        partitions: Vec<Partition>,
        sender: AggregatorSender,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<WorkerSummary>> {
        partitions
            .into_iter()
            .map(|partition| {
                let worker = PartitionWorker::new(
                    partition,
                    Arc::clone(&self.fetcher),
                    sender.clone(),
                    self.max_content_bytes,
                    cancel.clone(),
                );
                let span = tracing::info_span!(
                    "worker",
                    partition = partition.index,
                    source = self.fetcher.source_name()
                );
                tokio::spawn(worker.run().instrument(span))
            })
            .collect()
    }
}
