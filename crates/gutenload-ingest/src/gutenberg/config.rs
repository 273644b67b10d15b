//! Project Gutenberg source configuration

use gutenload_common::{env, ItemId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::DEFAULT_MAX_CONTENT_BYTES;
use crate::error::{PipelineError, PipelineResult};

/// Public Gutenberg mirror.
pub const DEFAULT_BASE_URL: &str = "https://www.gutenberg.org";

/// Per-attempt request timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// Bytes read from a text file before the stream is cut off.
pub const DEFAULT_MAX_DOWNLOAD_BYTES: usize = 500_000;

/// A decoded payload must be longer than this to count as a book.
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 5_000;

/// Configuration for the Gutenberg HTTP fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GutenbergConfig {
    /// Mirror root, without trailing slash
    pub base_url: String,
    /// Timeout for one candidate download (default: 15)
    pub fetch_timeout_secs: u64,
    /// Stream cap per download (default: 500 000)
    pub max_download_bytes: usize,
    /// Minimum decoded length of a usable payload (default: 5 000)
    pub min_content_chars: usize,
    /// Bound on stored content, shared with the pipeline
    pub max_content_bytes: usize,
    /// Skip RDF metadata and use default title/author/language
    pub skip_metadata: bool,
    pub user_agent: String,
}

impl Default for GutenbergConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
            min_content_chars: DEFAULT_MIN_CONTENT_CHARS,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            skip_metadata: false,
            user_agent: format!("gutenload/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GutenbergConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load fetcher settings from `GUTENLOAD_*` environment variables
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            base_url: env::string_or("GUTENLOAD_BASE_URL", &defaults.base_url),
            fetch_timeout_secs: env::var_or(
                "GUTENLOAD_FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout_secs,
            )?,
            max_download_bytes: env::var_or(
                "GUTENLOAD_MAX_DOWNLOAD_BYTES",
                defaults.max_download_bytes,
            )?,
            min_content_chars: env::var_or(
                "GUTENLOAD_MIN_CONTENT_CHARS",
                defaults.min_content_chars,
            )?,
            skip_metadata: env::var_or("GUTENLOAD_SKIP_METADATA", defaults.skip_metadata)?,
            ..defaults
        })
    }

    /// Set the mirror root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout_secs: u64) -> Self {
        self.fetch_timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_download_bytes(mut self, max_bytes: usize) -> Self {
        self.max_download_bytes = max_bytes;
        self
    }

    pub fn with_min_content_chars(mut self, min_chars: usize) -> Self {
        self.min_content_chars = min_chars;
        self
    }

    pub fn with_max_content_bytes(mut self, max_bytes: usize) -> Self {
        self.max_content_bytes = max_bytes;
        self
    }

    pub fn with_skip_metadata(mut self, skip: bool) -> Self {
        self.skip_metadata = skip;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Text file locations to try, in order
    pub fn candidate_urls(&self, id: ItemId) -> [String; 3] {
        let base = self.base_url.trim_end_matches('/');
        [
            format!("{}/files/{}/{}-0.txt", base, id, id),
            format!("{}/files/{}/{}.txt", base, id, id),
            format!("{}/cache/epub/{}/pg{}.txt", base, id, id),
        ]
    }

    /// RDF catalog record for a book
    pub fn metadata_url(&self, id: ItemId) -> String {
        format!("{}/ebooks/{}.rdf", self.base_url.trim_end_matches('/'), id)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(PipelineError::config(format!(
                "base URL must be http(s), got {}",
                self.base_url
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(PipelineError::config("fetch timeout must be positive"));
        }
        if self.max_download_bytes == 0 {
            return Err(PipelineError::config("max download bytes must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GutenbergConfig::default();
        assert_eq!(config.base_url, "https://www.gutenberg.org");
        assert_eq!(config.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(config.max_download_bytes, 500_000);
        assert_eq!(config.min_content_chars, 5_000);
        assert_eq!(config.max_content_bytes, 300_000);
        assert!(config.user_agent.starts_with("gutenload/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_candidate_urls_in_order() {
        let config = GutenbergConfig::new().with_base_url("http://mirror.local/");
        assert_eq!(
            config.candidate_urls(1342),
            [
                "http://mirror.local/files/1342/1342-0.txt".to_string(),
                "http://mirror.local/files/1342/1342.txt".to_string(),
                "http://mirror.local/cache/epub/1342/pg1342.txt".to_string(),
            ]
        );
        assert_eq!(config.metadata_url(1342), "http://mirror.local/ebooks/1342.rdf");
    }

    #[test]
    fn test_builder_pattern() {
        let config = GutenbergConfig::new()
            .with_fetch_timeout(5)
            .with_max_download_bytes(1024)
            .with_min_content_chars(10)
            .with_max_content_bytes(512)
            .with_skip_metadata(true);

        assert_eq!(config.fetch_timeout_secs, 5);
        assert_eq!(config.max_download_bytes, 1024);
        assert_eq!(config.min_content_chars, 10);
        assert_eq!(config.max_content_bytes, 512);
        assert!(config.skip_metadata);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(GutenbergConfig::new().with_base_url("ftp://x").validate().is_err());
        assert!(GutenbergConfig::new().with_fetch_timeout(0).validate().is_err());
        assert!(GutenbergConfig::new().with_max_download_bytes(0).validate().is_err());
    }
}
