//! Shared fetcher and sink stubs for pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use gutenload_common::{FetchedRecord, ItemId};
use gutenload_ingest::config::PipelineConfig;
use gutenload_ingest::framework::{FetchError, ItemFetcher, StorageError, StorageSink};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Fetchers
// ============================================================================

/// Configurable in-memory fetcher.
///
/// Succeeds for every ID unless a success set is given, optionally sleeping
/// per ID and panicking on chosen IDs.
#[derive(Debug, Default)]
pub struct StubFetcher {
    succeed: Option<HashSet<ItemId>>,
    delays: HashMap<ItemId, Duration>,
    default_delay: Duration,
    panic_on: HashSet<ItemId>,
    content_len: usize,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn all() -> Self {
        Self {
            content_len: 32,
            ..Self::default()
        }
    }

    pub fn only(ids: impl IntoIterator<Item = ItemId>) -> Self {
        Self {
            succeed: Some(ids.into_iter().collect()),
            ..Self::all()
        }
    }

    pub fn with_delay(mut self, id: ItemId, delay: Duration) -> Self {
        self.delays.insert(id, delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_panic_on(mut self, id: ItemId) -> Self {
        self.panic_on.insert(id);
        self
    }

    pub fn with_content_len(mut self, len: usize) -> Self {
        self.content_len = len;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemFetcher for StubFetcher {
    async fn fetch(&self, item_id: ItemId) -> Result<FetchedRecord, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.get(&item_id).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.panic_on.contains(&item_id) {
            panic!("stub fetcher exploded on {}", item_id);
        }

        let present = self.succeed.as_ref().is_none_or(|ids| ids.contains(&item_id));
        if present {
            Ok(FetchedRecord::new(
                item_id,
                format!("Title {}", item_id),
                "Stub Author",
                "en",
                "x".repeat(self.content_len),
            ))
        } else {
            Err(FetchError::NotFound(item_id))
        }
    }

    fn source_name(&self) -> &str {
        "stub"
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// One `insert_batch` call as seen by the sink
#[derive(Debug, Clone)]
pub struct Flush {
    pub ids: Vec<ItemId>,
    pub content_lens: Vec<usize>,
    pub at: Instant,
    pub accepted: bool,
}

impl Flush {
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Non-deduplicating in-memory sink that records every call.
///
/// With `failing_on(n)` the n-th call (1-based) returns an error.
#[derive(Debug, Default)]
pub struct MemorySink {
    flushes: Mutex<Vec<Flush>>,
    rows: Mutex<Vec<FetchedRecord>>,
    fail_on_call: Option<usize>,
    calls: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn flushes(&self) -> Vec<Flush> {
        self.flushes.lock().unwrap().clone()
    }

    pub fn accepted_flushes(&self) -> Vec<Flush> {
        self.flushes().into_iter().filter(|f| f.accepted).collect()
    }

    pub fn rows(&self) -> Vec<FetchedRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn stored_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<_> = self.rows().into_iter().map(|r| r.item_id).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn insert_batch(&self, records: &[FetchedRecord]) -> Result<u64, StorageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let accepted = self.fail_on_call != Some(call);

        self.flushes.lock().unwrap().push(Flush {
            ids: records.iter().map(|r| r.item_id).collect(),
            content_lens: records.iter().map(|r| r.content.len()).collect(),
            at: Instant::now(),
            accepted,
        });

        if !accepted {
            return Err(StorageError::Rejected(format!("stub failure on call {}", call)));
        }

        self.rows.lock().unwrap().extend_from_slice(records);
        Ok(records.len() as u64)
    }

    fn sink_name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Config helpers
// ============================================================================

/// Small, fast pipeline configuration for tests
pub fn test_config(start: u64, end: u64, workers: usize, batch_size: usize) -> PipelineConfig {
    PipelineConfig::new()
        .with_id_range(start, end)
        .with_worker_count(workers)
        .with_batch_size(batch_size)
        .with_poll_interval_ms(10)
}
