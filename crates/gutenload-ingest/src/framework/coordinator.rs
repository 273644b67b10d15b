//! Pipeline coordinator
//!
//! Wires one run together:
//! 1. Partition the ID range across the configured number of workers
//! 2. Start the batch loader on the receiving end of the aggregator
//! 3. Spawn one worker task per partition and wait for all of them
//! 4. Wait for the loader's final flush and report

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

use super::aggregator;
use super::fetcher::ItemFetcher;
use super::loader::{BatchLoader, FlushPolicy};
use super::partition::partition_range;
use super::stats::{PipelineProgress, PipelineStats};
use super::storage::StorageSink;
use super::worker::{WorkerPool, WorkerSummary};

/// State shared by every task of one run
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub run_id: Uuid,
    pub config: PipelineConfig,
    pub stats: Arc<PipelineStats>,
    pub cancel: CancellationToken,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        let stats = Arc::new(PipelineStats::new(config.total_items()));
        Self {
            run_id: Uuid::new_v4(),
            config,
            stats,
            cancel: CancellationToken::new(),
        }
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy::new(self.config.batch_size, self.config.flush_interval())
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub progress: PipelineProgress,
    pub workers: Vec<WorkerSummary>,
    pub cancelled: bool,
}

impl PipelineReport {
    /// Every ID in the range produced a tick
    pub fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }
}

/// Fetch-aggregate-load pipeline over one fetcher and one sink
pub struct IngestPipeline<F, S>
where
    F: ItemFetcher + ?Sized + 'static,
    S: StorageSink + ?Sized + 'static,
{
    context: PipelineContext,
    fetcher: Arc<F>,
    sink: Arc<S>,
}

impl<F, S> IngestPipeline<F, S>
where
    F: ItemFetcher + ?Sized + 'static,
    S: StorageSink + ?Sized + 'static,
{
    pub fn new(config: PipelineConfig, fetcher: Arc<F>, sink: Arc<S>) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            context: PipelineContext::new(config),
            fetcher,
            sink,
        })
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Live counters, readable while the run is in progress
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.context.stats)
    }

    /// Token that stops workers before their next fetch when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.context.cancel.clone()
    }

    /// Process the whole configured range.
    ///
    /// Per-item and per-batch failures are counted in the report; only a
    /// bad configuration or a crashed loader task is returned as an error.
    pub async fn run(self) -> PipelineResult<PipelineReport> {
        let ctx = self.context;
        let config = &ctx.config;
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();

        let partitions =
            partition_range(config.id_range_start, config.id_range_end, config.worker_count)?;

        info!(
            run_id = %ctx.run_id,
            start = config.id_range_start,
            end = config.id_range_end,
            workers = partitions.len(),
            batch_size = config.batch_size,
            source = self.fetcher.source_name(),
            sink = self.sink.sink_name(),
            "Starting ingestion run"
        );

        let (sender, receiver) = aggregator::channel();

        let loader = BatchLoader::new(
            Arc::clone(&self.sink),
            ctx.flush_policy(),
            config.poll_interval(),
            config.total_items(),
            Arc::clone(&ctx.stats),
        )
        .with_progress_log_every(config.progress_log_every);
        let loader_span = tracing::info_span!("loader", run_id = %ctx.run_id);
        let loader_handle = tokio::spawn(loader.run(receiver).instrument(loader_span));

        let pool = WorkerPool::new(Arc::clone(&self.fetcher), config.max_content_bytes);
        let worker_handles = pool.spawn(partitions, sender, &ctx.cancel);

        let mut workers = Vec::with_capacity(worker_handles.len());
        for (index, joined) in join_all(worker_handles).await.into_iter().enumerate() {
            match joined {
                Ok(summary) => workers.push(summary),
                Err(e) => {
                    error!(worker = index, error = %e, "Worker task terminated abnormally");
                },
            }
        }

        let progress = loader_handle
            .await
            .map_err(|e| PipelineError::Loader(e.to_string()))?;

        let report = PipelineReport {
            run_id: ctx.run_id,
            started_at,
            finished_at: Utc::now(),
            elapsed: clock.elapsed(),
            progress,
            cancelled: ctx.cancel.is_cancelled(),
            workers,
        };

        info!(
            run_id = %report.run_id,
            processed = report.progress.processed,
            total = report.progress.total,
            succeeded = report.progress.succeeded,
            stored = report.progress.records_stored,
            failed_flushes = report.progress.failed_flushes,
            elapsed_secs = report.elapsed.as_secs_f64(),
            cancelled = report.cancelled,
            "Ingestion run finished"
        );

        Ok(report)
    }
}
