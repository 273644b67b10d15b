//! Common types used across gutenload

use serde::{Deserialize, Serialize};

/// Numeric identifier of a remote document (a Gutenberg book number)
pub type ItemId = u64;

/// Title used when metadata extraction fails
pub fn default_title(item_id: ItemId) -> String {
    format!("Book {}", item_id)
}

/// Author used when metadata extraction fails
pub const DEFAULT_AUTHOR: &str = "Unknown";

/// Language code used when metadata extraction fails
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

/// A fetched and cleaned document, ready to be persisted.
///
/// Records are immutable once produced: a worker owns it until it is handed
/// to the aggregator, after which the batch loader owns it until flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedRecord {
    /// Source identifier, also the deduplication key in storage
    pub item_id: ItemId,

    /// Title from metadata, or `"Book {id}"`
    pub title: String,

    /// Author from metadata, or `"Unknown"`
    pub author: String,

    /// Two-letter language code, or `"en"`
    pub language_code: String,

    /// Document body with boilerplate removed
    pub content: String,
}

impl FetchedRecord {
    pub fn new(
        item_id: ItemId,
        title: impl Into<String>,
        author: impl Into<String>,
        language_code: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            item_id,
            title: title.into(),
            author: author.into(),
            language_code: language_code.into(),
            content: content.into(),
        }
    }

    /// Record carrying only content, with default metadata
    pub fn with_default_metadata(item_id: ItemId, content: impl Into<String>) -> Self {
        Self::new(
            item_id,
            default_title(item_id),
            DEFAULT_AUTHOR,
            DEFAULT_LANGUAGE_CODE,
            content,
        )
    }

    /// Bound `content` to at most `max_bytes`
    pub fn truncated(mut self, max_bytes: usize) -> Self {
        truncate_on_char_boundary(&mut self.content, max_bytes);
        self
    }
}

/// Truncate `text` to the largest UTF-8 boundary not exceeding `max_bytes`.
///
/// For ASCII text the result is exactly `max_bytes` long whenever the input
/// was longer.
pub fn truncate_on_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }

    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// Per-item completion signal emitted exactly once for every processed ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressTick {
    Success,
    Failure,
}
