//! HTTP fetcher for Project Gutenberg books
//!
//! For every ID the text file is looked up at a fixed list of mirror paths,
//! the first usable payload wins. The body is streamed with a hard byte cap,
//! stripped of license boilerplate, and paired with metadata from the RDF
//! catalog record.

use async_trait::async_trait;
use futures::StreamExt;
use gutenload_common::{FetchedRecord, ItemId};
use reqwest::Client;
use tracing::debug;

use super::cleaning::clean_content;
use super::config::GutenbergConfig;
use super::metadata::{BookMetadata, RdfParser};
use crate::error::{PipelineError, PipelineResult};
use crate::framework::{FetchError, ItemFetcher};

pub struct GutenbergFetcher {
    client: Client,
    config: GutenbergConfig,
    rdf: RdfParser,
}

impl GutenbergFetcher {
    pub fn new(config: GutenbergConfig) -> PipelineResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        let rdf = RdfParser::new()
            .map_err(|e| PipelineError::config(format!("invalid metadata pattern: {}", e)))?;

        Ok(Self {
            client,
            config,
            rdf,
        })
    }

    pub fn config(&self) -> &GutenbergConfig {
        &self.config
    }

    /// Try every candidate URL in order and return the first usable text.
    ///
    /// When all candidates fail, the last failure other than a 404 is
    /// returned, or [`FetchError::NotFound`] if every source was missing.
    pub async fn download_text(&self, id: ItemId) -> Result<String, FetchError> {
        let timeout = self.config.fetch_timeout();
        let mut last_error = None;

        for url in self.config.candidate_urls(id) {
            let attempt = tokio::time::timeout(timeout, self.download_candidate(&url)).await;
            let err = match attempt {
                Ok(Ok(text)) => {
                    debug!(item_id = id, url = %url, bytes = text.len(), "Downloaded text");
                    return Ok(text);
                },
                Ok(Err(e)) => e,
                Err(_) => FetchError::Timeout(timeout),
            };

            debug!(item_id = id, url = %url, kind = err.kind(), error = %err, "Candidate failed");
            if err != (FetchError::Http { status: 404 }) {
                last_error = Some(err);
            }
        }

        Err(last_error.unwrap_or(FetchError::NotFound(id)))
    }

    async fn download_candidate(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let cap = self.config.max_download_bytes;
        let mut body = Vec::with_capacity(cap.min(64 * 1024));
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify(e))?;
            body.extend_from_slice(&chunk);
            if body.len() >= cap {
                body.truncate(cap);
                break;
            }
        }

        let text = String::from_utf8_lossy(&body).into_owned();
        let chars = text.chars().count();
        if chars <= self.config.min_content_chars {
            return Err(FetchError::ContentTooShort {
                len: chars,
                min: self.config.min_content_chars,
            });
        }

        Ok(text)
    }

    /// Catalog metadata for a book; any failure yields the defaults
    pub async fn fetch_metadata(&self, id: ItemId) -> BookMetadata {
        if self.config.skip_metadata {
            return BookMetadata::defaults(id);
        }

        let url = self.config.metadata_url(id);
        let request = async {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            response.text().await
        };

        match tokio::time::timeout(self.config.fetch_timeout(), request).await {
            Ok(Ok(rdf)) => self.rdf.parse(id, &rdf),
            Ok(Err(e)) => {
                debug!(item_id = id, error = %e, "Metadata unavailable, using defaults");
                BookMetadata::defaults(id)
            },
            Err(_) => {
                debug!(item_id = id, "Metadata request timed out, using defaults");
                BookMetadata::defaults(id)
            },
        }
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.fetch_timeout())
        } else if let Some(status) = err.status() {
            FetchError::Http {
                status: status.as_u16(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl ItemFetcher for GutenbergFetcher {
    async fn fetch(&self, item_id: ItemId) -> Result<FetchedRecord, FetchError> {
        if item_id == 0 {
            return Err(FetchError::Skipped(item_id));
        }

        let raw = self.download_text(item_id).await?;
        let content = clean_content(&raw, self.config.max_content_bytes);
        if content.is_empty() {
            return Err(FetchError::EmptyContent(item_id));
        }
        let metadata = self.fetch_metadata(item_id).await;

        Ok(FetchedRecord::new(
            item_id,
            metadata.title,
            metadata.author,
            metadata.language_code,
            content,
        ))
    }

    fn source_name(&self) -> &str {
        "gutenberg"
    }
}

impl std::fmt::Debug for GutenbergFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GutenbergFetcher")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

