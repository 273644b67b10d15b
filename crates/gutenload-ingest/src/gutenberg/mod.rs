//! Project Gutenberg source and PostgreSQL book storage
//!
//! - [`GutenbergFetcher`] implements [`crate::framework::ItemFetcher`] over
//!   the public mirror (plain-text editions plus RDF catalog metadata)
//! - [`PgBookStore`] implements [`crate::framework::StorageSink`] over the
//!   `books` table

pub mod cleaning;
pub mod config;
pub mod fetcher;
pub mod metadata;
pub mod storage;

pub use cleaning::clean_content;
pub use config::GutenbergConfig;
pub use fetcher::GutenbergFetcher;
pub use metadata::{BookMetadata, RdfParser};
pub use storage::{DuplicatePolicy, PgBookStore};
