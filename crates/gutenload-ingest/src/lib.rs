//! Gutenload Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Concurrent fetch, aggregate and batch-load pipeline that pulls Project
//! Gutenberg books by numeric ID and stores them in PostgreSQL.
//!
//! # Layout
//!
//! - [`framework`]: the source-agnostic pipeline (partitioning, worker pool,
//!   result aggregation, batch loader, storage contract)
//! - [`gutenberg`]: the Gutenberg HTTP fetcher and the PostgreSQL book store
//! - [`config`]: environment-driven configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gutenload_ingest::config::IngestConfig;
//! use gutenload_ingest::framework::IngestPipeline;
//! use gutenload_ingest::gutenberg::{GutenbergFetcher, PgBookStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let store = PgBookStore::connect(&config.database, config.duplicate_policy).await?;
//!     let fetcher = GutenbergFetcher::new(config.gutenberg.clone())?;
//!
//!     let pipeline = IngestPipeline::new(config.pipeline, Arc::new(fetcher), Arc::new(store))?;
//!     let report = pipeline.run().await?;
//!     println!("stored {} books", report.progress.records_stored);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod framework;
pub mod gutenberg;

pub use error::{PipelineError, PipelineResult};
