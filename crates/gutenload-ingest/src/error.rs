//! Pipeline-level errors
//!
//! Only these abort a run. Per-item fetch failures and per-batch flush
//! failures are counted and logged inside the pipeline instead.

use gutenload_common::GutenloadError;
use thiserror::Error;

use crate::framework::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid or inconsistent configuration
    #[error("Invalid pipeline configuration: {0}")]
    Config(String),

    /// Environment could not be parsed
    #[error(transparent)]
    Environment(#[from] GutenloadError),

    /// Storage could not be reached or prepared
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// HTTP client construction failed
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The batch loader task terminated abnormally
    #[error("Batch loader task failed: {0}")]
    Loader(String),
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
