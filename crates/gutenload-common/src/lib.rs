//! Gutenload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the gutenload workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`GutenloadError`] and the crate [`Result`] alias
//! - **Types**: the records and signals that flow through the ingest pipeline
//! - **Environment**: typed lookups of configuration variables
//! - **Logging**: centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use gutenload_common::types::FetchedRecord;
//!
//! let record = FetchedRecord::new(84, "Frankenstein", "Shelley, Mary", "en", "It was...")
//!     .truncated(300_000);
//! assert_eq!(record.item_id, 84);
//! ```

pub mod env;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{GutenloadError, Result};
pub use types::{
    default_title, FetchedRecord, ItemId, ProgressTick, DEFAULT_AUTHOR, DEFAULT_LANGUAGE_CODE,
};
