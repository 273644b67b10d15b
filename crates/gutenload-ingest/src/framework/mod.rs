//! Source-agnostic fetch-aggregate-load framework
//!
//! A fixed pool of workers fetches items from static partitions of an ID
//! range, hands results and progress ticks to an aggregator, and a single
//! batch loader flushes accumulated records to a storage sink.

pub mod aggregator;
pub mod coordinator;
pub mod fetcher;
pub mod loader;
pub mod partition;
pub mod stats;
pub mod storage;
pub mod worker;

// Re-export commonly used types
pub use aggregator::{AggregatorReceiver, AggregatorSender, TickCounts};
pub use coordinator::{IngestPipeline, PipelineContext, PipelineReport};
pub use fetcher::{FetchError, ItemFetcher};
pub use loader::{BatchLoader, FlushPolicy, FlushReason};
pub use partition::{partition_range, Partition};
pub use stats::{PipelineProgress, PipelineStats};
pub use storage::{StorageError, StorageSink};
pub use worker::{PartitionWorker, WorkerPool, WorkerSummary};
