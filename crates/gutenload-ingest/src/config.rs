//! Ingestion configuration
//!
//! Values come from environment variables (after loading `.env`), falling
//! back to the defaults below. The CLI layers flag overrides on top.

use gutenload_common::env;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::DbConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::gutenberg::{DuplicatePolicy, GutenbergConfig};

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// First book ID to fetch.
pub const DEFAULT_ID_RANGE_START: u64 = 1;

/// Last book ID to fetch (inclusive).
pub const DEFAULT_ID_RANGE_END: u64 = 70_000;

/// Number of concurrent fetch workers.
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Records per storage flush.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Maximum age of a non-empty batch before it is flushed.
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 10;

/// How long the loader sleeps when there is nothing to flush.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Upper bound on stored content per record.
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 300_000;

/// Processed-item interval between progress log lines.
pub const DEFAULT_PROGRESS_LOG_EVERY: u64 = 100;

/// Configuration of the fetch-aggregate-load pipeline itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub id_range_start: u64,
    pub id_range_end: u64,
    pub worker_count: usize,
    pub batch_size: usize,
    pub flush_interval_secs: u64,
    pub poll_interval_ms: u64,
    pub max_content_bytes: usize,
    pub progress_log_every: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            id_range_start: DEFAULT_ID_RANGE_START,
            id_range_end: DEFAULT_ID_RANGE_END,
            worker_count: DEFAULT_WORKER_COUNT,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            progress_log_every: DEFAULT_PROGRESS_LOG_EVERY,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load pipeline settings from `GUTENLOAD_*` environment variables
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            id_range_start: env::var_or("GUTENLOAD_ID_START", defaults.id_range_start)?,
            id_range_end: env::var_or("GUTENLOAD_ID_END", defaults.id_range_end)?,
            worker_count: env::var_or("GUTENLOAD_WORKERS", defaults.worker_count)?,
            batch_size: env::var_or("GUTENLOAD_BATCH_SIZE", defaults.batch_size)?,
            flush_interval_secs: env::var_or(
                "GUTENLOAD_FLUSH_INTERVAL_SECS",
                defaults.flush_interval_secs,
            )?,
            poll_interval_ms: env::var_or("GUTENLOAD_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            max_content_bytes: env::var_or(
                "GUTENLOAD_MAX_CONTENT_BYTES",
                defaults.max_content_bytes,
            )?,
            progress_log_every: env::var_or(
                "GUTENLOAD_PROGRESS_LOG_EVERY",
                defaults.progress_log_every,
            )?,
        })
    }

    /// Set the inclusive ID range
    pub fn with_id_range(mut self, start: u64, end: u64) -> Self {
        self.id_range_start = start;
        self.id_range_end = end;
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval_secs(mut self, secs: u64) -> Self {
        self.flush_interval_secs = secs;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_content_bytes(mut self, max_bytes: usize) -> Self {
        self.max_content_bytes = max_bytes;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Number of IDs in the configured range
    pub fn total_items(&self) -> u64 {
        if self.id_range_end < self.id_range_start {
            return 0;
        }
        self.id_range_end - self.id_range_start + 1
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.id_range_start == 0 {
            return Err(PipelineError::config("id range must start at 1 or above"));
        }
        if self.id_range_start > self.id_range_end {
            return Err(PipelineError::config(format!(
                "id range start {} is after end {}",
                self.id_range_start, self.id_range_end
            )));
        }
        if self.worker_count == 0 {
            return Err(PipelineError::config("worker count must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch size must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(PipelineError::config("poll interval must be positive"));
        }
        if self.max_content_bytes == 0 {
            return Err(PipelineError::config("max content bytes must be positive"));
        }
        if self.progress_log_every == 0 {
            return Err(PipelineError::config("progress log interval must be positive"));
        }
        Ok(())
    }
}

/// Full configuration for a loader run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub pipeline: PipelineConfig,
    pub gutenberg: GutenbergConfig,
    pub database: DbConfig,
    pub duplicate_policy: DuplicatePolicy,
}

impl IngestConfig {
    /// Load every section from the environment
    pub fn from_env() -> PipelineResult<Self> {
        dotenvy::dotenv().ok();

        let pipeline = PipelineConfig::from_env()?;
        let gutenberg =
            GutenbergConfig::from_env()?.with_max_content_bytes(pipeline.max_content_bytes);

        let config = Self {
            pipeline,
            gutenberg,
            database: DbConfig::from_env()?,
            duplicate_policy: env::var_or("GUTENLOAD_DUPLICATE_POLICY", DuplicatePolicy::default())?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Propagate shared limits after overrides were applied
    pub fn sync_limits(&mut self) {
        self.gutenberg.max_content_bytes = self.pipeline.max_content_bytes;
    }

    pub fn validate(&self) -> PipelineResult<()> {
        self.pipeline.validate()?;
        self.gutenberg.validate()?;
        self.database.validate()?;
        Ok(())
    }
}
