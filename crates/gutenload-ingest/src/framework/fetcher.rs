//! Item fetcher capability
//!
//! Implement [`ItemFetcher`] for any remote source addressed by numeric ID.

use async_trait::async_trait;
use gutenload_common::{FetchedRecord, ItemId};
use std::time::Duration;
use thiserror::Error;

/// Why an item produced no record.
///
/// Every variant is a per-item, non-fatal outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("item {0} is reserved and never fetched")]
    Skipped(ItemId),

    #[error("no candidate source has item {0}")]
    NotFound(ItemId),

    #[error("unexpected HTTP status {status}")]
    Http { status: u16 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("content too short: {len} chars, need more than {min}")]
    ContentTooShort { len: usize, min: usize },

    #[error("item {0} has no text between its boilerplate markers")]
    EmptyContent(ItemId),

    #[error("fetcher panicked: {0}")]
    Panicked(String),
}

impl FetchError {
    /// Stable label for logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Skipped(_) => "skipped",
            FetchError::NotFound(_) => "not_found",
            FetchError::Http { .. } => "http",
            FetchError::Timeout(_) => "timeout",
            FetchError::Network(_) => "network",
            FetchError::ContentTooShort { .. } => "content_too_short",
            FetchError::EmptyContent(_) => "empty_content",
            FetchError::Panicked(_) => "panicked",
        }
    }

    /// Absence that is expected for sparse ID ranges
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            FetchError::Skipped(_) | FetchError::NotFound(_) | FetchError::Http { status: 404 }
        )
    }
}

/// Produces a record for an item ID, or explains why there is none.
///
/// Implementations must return rather than propagate failures; the worker
/// pool additionally isolates panics per item.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    async fn fetch(&self, item_id: ItemId) -> Result<FetchedRecord, FetchError>;

    /// Name used in log fields
    fn source_name(&self) -> &str {
        "unknown"
    }
}
