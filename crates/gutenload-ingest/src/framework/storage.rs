//! Storage sink interface
//!
//! A sink persists one batch per call as a single bulk operation. The
//! pipeline does not deduplicate: an item reprocessed by a restart reaches
//! the sink again, and the sink's own duplicate policy decides the outcome.

use async_trait::async_trait;
use gutenload_common::FetchedRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection could not be established; fatal at startup
    #[error("Failed to connect to storage: {0}")]
    Connect(#[source] sqlx::Error),

    /// The batch insert or its commit failed; nothing from the batch is kept
    #[error("Batch insert of {records} records failed: {source}")]
    Insert {
        records: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("Schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Schema preparation failed: {0}")]
    Schema(#[source] sqlx::Error),

    /// The sink refused the batch without touching the backend
    #[error("Batch rejected: {0}")]
    Rejected(String),
}

/// Bulk persistence of fetched records.
///
/// `insert_batch` is atomic per call from the pipeline's point of view and
/// returns the number of rows written. The slice is never mutated.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn insert_batch(&self, records: &[FetchedRecord]) -> Result<u64, StorageError>;

    /// Name used in log fields
    fn sink_name(&self) -> &str {
        "storage"
    }
}
