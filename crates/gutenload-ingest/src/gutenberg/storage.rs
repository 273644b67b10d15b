//! PostgreSQL book store
//!
//! One transaction per batch. Rows go in as multi-row `INSERT ... VALUES`
//! statements, split so no statement exceeds the bind parameter limit.

use async_trait::async_trait;
use gutenload_common::FetchedRecord;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::db::{self, DbConfig};
use crate::framework::{StorageError, StorageSink};

/// Columns bound per row
const COLUMNS_PER_ROW: usize = 5;

/// PostgreSQL accepts at most 65 535 bind parameters per statement.
pub const MAX_ROWS_PER_STATEMENT: usize = 65_535 / COLUMNS_PER_ROW;

/// Unique index required by the `ignore` and `upsert` policies
pub const UNIQUE_INDEX_NAME: &str = "books_gutenberg_id_key";

/// What to do when a batch contains a book that is already stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Plain insert; reprocessed books become duplicate rows
    #[default]
    Allow,
    /// Keep the existing row
    Ignore,
    /// Replace the existing row's metadata and content
    Upsert,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &str {
        match self {
            DuplicatePolicy::Allow => "allow",
            DuplicatePolicy::Ignore => "ignore",
            DuplicatePolicy::Upsert => "upsert",
        }
    }

    pub fn requires_unique_index(&self) -> bool {
        !matches!(self, DuplicatePolicy::Allow)
    }

    fn conflict_clause(&self) -> &'static str {
        match self {
            DuplicatePolicy::Allow => "",
            DuplicatePolicy::Ignore => " ON CONFLICT (gutenberg_id) DO NOTHING",
            DuplicatePolicy::Upsert => {
                " ON CONFLICT (gutenberg_id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 author = EXCLUDED.author, \
                 language_code = EXCLUDED.language_code, \
                 content = EXCLUDED.content"
            },
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(DuplicatePolicy::Allow),
            "ignore" => Ok(DuplicatePolicy::Ignore),
            "upsert" => Ok(DuplicatePolicy::Upsert),
            other => Err(format!(
                "unknown duplicate policy '{}', expected allow, ignore or upsert",
                other
            )),
        }
    }
}

/// A row ready for binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BookRow<'a> {
    gutenberg_id: i64,
    record: &'a FetchedRecord,
}

/// Convert records to rows, applying the policy's in-batch deduplication.
///
/// `Upsert` keeps the last record per ID since a single statement cannot
/// update the same row twice. IDs that do not fit a `BIGINT` reject the
/// whole batch.
fn prepare_rows(
    records: &[FetchedRecord],
    policy: DuplicatePolicy,
) -> Result<Vec<BookRow<'_>>, StorageError> {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let gutenberg_id = i64::try_from(record.item_id).map_err(|_| {
            StorageError::Rejected(format!("item id {} exceeds BIGINT", record.item_id))
        })?;
        rows.push(BookRow {
            gutenberg_id,
            record,
        });
    }

    if policy != DuplicatePolicy::Upsert {
        return Ok(rows);
    }

    let mut last_index: HashMap<i64, usize> = HashMap::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        last_index.insert(row.gutenberg_id, index);
    }

    Ok(rows
        .into_iter()
        .enumerate()
        .filter(|(index, row)| last_index.get(&row.gutenberg_id) == Some(index))
        .map(|(_, row)| row)
        .collect())
}

/// Build one multi-row insert for `rows`
fn build_insert<'a>(rows: &[BookRow<'a>], policy: DuplicatePolicy) -> QueryBuilder<'a, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO books (gutenberg_id, title, author, language_code, content) ",
    );

    query_builder.push_values(rows.iter(), |mut b, row| {
        let record: &'a FetchedRecord = row.record;
        b.push_bind(row.gutenberg_id)
            .push_bind(record.title.as_str())
            .push_bind(record.author.as_str())
            .push_bind(record.language_code.as_str())
            .push_bind(record.content.as_str());
    });

    query_builder.push(policy.conflict_clause());
    query_builder
}

/// [`StorageSink`] writing to the `books` table
#[derive(Debug, Clone)]
pub struct PgBookStore {
    pool: PgPool,
    policy: DuplicatePolicy,
}

impl PgBookStore {
    pub fn new(pool: PgPool, policy: DuplicatePolicy) -> Self {
        Self { pool, policy }
    }

    /// Open a pool and verify the server answers
    pub async fn connect(config: &DbConfig, policy: DuplicatePolicy) -> Result<Self, StorageError> {
        let pool = db::create_pool(config).await?;
        Ok(Self::new(pool, policy))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Apply pending migrations and the unique index the policy needs
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        if self.policy.requires_unique_index() {
            sqlx::query(&format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON books (gutenberg_id)",
                UNIQUE_INDEX_NAME
            ))
            .execute(&self.pool)
            .await
            .map_err(StorageError::Schema)?;
        }

        info!(policy = %self.policy, "Book schema ready");
        Ok(())
    }

    /// Number of stored rows
    pub async fn count(&self) -> Result<i64, StorageError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Schema)
    }
}

#[async_trait]
impl StorageSink for PgBookStore {
    async fn insert_batch(&self, records: &[FetchedRecord]) -> Result<u64, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let rows = prepare_rows(records, self.policy)?;
        let insert_error = |source: sqlx::Error| StorageError::Insert {
            records: records.len(),
            source,
        };

        let mut tx = self.pool.begin().await.map_err(insert_error)?;
        let mut written = 0;

        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let result = build_insert(chunk, self.policy)
                .build()
                .execute(&mut *tx)
                .await
                .map_err(insert_error)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(insert_error)?;

        debug!(records = records.len(), written, policy = %self.policy, "Batch committed");
        Ok(written)
    }

    fn sink_name(&self) -> &str {
        "postgres"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn record(id: u64, title: &str) -> FetchedRecord {
        FetchedRecord::new(id, title, "Author", "en", "content")
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("allow".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Allow));
        assert_eq!("IGNORE".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Ignore));
        assert_eq!("upsert".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Upsert));
        assert!("replace".parse::<DuplicatePolicy>().is_err());
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::Allow);
        assert_eq!(DuplicatePolicy::Upsert.to_string(), "upsert");
    }

    #[test]
    fn test_insert_sql_per_policy() {
        let records = vec![record(1, "A"), record(2, "B")];

        let rows = prepare_rows(&records, DuplicatePolicy::Allow).unwrap();
        let sql = build_insert(&rows, DuplicatePolicy::Allow).into_sql();
        assert!(sql.starts_with(
            "INSERT INTO books (gutenberg_id, title, author, language_code, content) VALUES ("
        ));
        assert!(sql.contains("$10"));
        assert!(!sql.contains("ON CONFLICT"));

        let sql = build_insert(&rows, DuplicatePolicy::Ignore).into_sql();
        assert!(sql.ends_with("ON CONFLICT (gutenberg_id) DO NOTHING"));

        let sql = build_insert(&rows, DuplicatePolicy::Upsert).into_sql();
        assert!(sql.contains("DO UPDATE SET title = EXCLUDED.title"));
    }

    #[test]
    fn test_upsert_keeps_last_record_per_id() {
        let records = vec![record(1, "old"), record(2, "B"), record(1, "new")];

        let rows = prepare_rows(&records, DuplicatePolicy::Upsert).unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.record.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "new"]);

        let rows = prepare_rows(&records, DuplicatePolicy::Allow).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_oversized_id_rejects_batch() {
        let records = vec![record(1, "A"), record(u64::MAX, "B")];
        let err = prepare_rows(&records, DuplicatePolicy::Allow).unwrap_err();
        assert!(matches!(err, StorageError::Rejected(_)));
    }

    #[test]
    fn test_statement_chunk_fits_bind_limit() {
        assert!(MAX_ROWS_PER_STATEMENT * COLUMNS_PER_ROW <= 65_535);
    }
}
