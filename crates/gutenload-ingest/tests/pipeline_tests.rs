//! End-to-end tests for the fetch-aggregate-load pipeline
//!
//! Every test runs the real worker pool, aggregator and batch loader against
//! in-memory stubs. Timing-sensitive tests use tokio's paused clock, so
//! sleeps advance virtual time instantly.
//!
//! ```bash
//! cargo test -p gutenload-ingest --test pipeline_tests
//! ```

mod common;

use common::{test_config, MemorySink, StubFetcher};
use gutenload_ingest::framework::IngestPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Processing counts
// ============================================================================

#[tokio::test]
async fn test_success_set_drives_counts() {
    let present = [2, 3, 5, 7, 11, 13];
    let fetcher = Arc::new(StubFetcher::only(present));
    let sink = Arc::new(MemorySink::new());

    let pipeline =
        IngestPipeline::new(test_config(1, 15, 3, 4), fetcher.clone(), sink.clone()).unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.progress.succeeded, present.len() as u64);
    assert_eq!(report.progress.processed, 15);
    assert_eq!(report.progress.failed, 9);
    assert_eq!(report.progress.records_stored, present.len() as u64);
    assert_eq!(sink.stored_ids(), present.to_vec());
    assert_eq!(fetcher.calls(), 15);
}

#[tokio::test]
async fn test_end_to_end_batch_sizes() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = IngestPipeline::new(
        test_config(1, 23, 4, 10),
        Arc::new(StubFetcher::all()),
        sink.clone(),
    )
    .unwrap();

    let report = pipeline.run().await.unwrap();

    let mut sizes: Vec<_> = sink.flushes().iter().map(|f| f.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![3, 10, 10]);
    assert_eq!(report.progress.records_stored, 23);
    assert_eq!(report.progress.processed, 23);
    assert_eq!(report.progress.flushes, 3);
    assert_eq!(sink.stored_ids(), (1..=23).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_workers_report_their_partitions() {
    let pipeline = IngestPipeline::new(
        test_config(1, 23, 4, 10),
        Arc::new(StubFetcher::all()),
        Arc::new(MemorySink::new()),
    )
    .unwrap();

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.workers.len(), 4);
    let per_worker: u64 = report.workers.iter().map(|w| w.processed).sum();
    assert_eq!(per_worker, 23);
    assert!(report.workers.iter().all(|w| !w.cancelled));
}

// ============================================================================
// Flush triggers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_size_threshold_flushes_before_next_record() {
    let fetcher = StubFetcher::all().with_delay(6, Duration::from_secs(1));
    let sink = Arc::new(MemorySink::new());
    let config = test_config(1, 6, 1, 5).with_flush_interval_secs(10);

    let start = Instant::now();
    let pipeline = IngestPipeline::new(config, Arc::new(fetcher), sink.clone()).unwrap();
    pipeline.run().await.unwrap();

    let flushes = sink.flushes();
    assert_eq!(flushes.len(), 2);
    assert_eq!(flushes[0].ids, vec![1, 2, 3, 4, 5]);
    assert!(
        flushes[0].at.duration_since(start) < Duration::from_secs(1),
        "first batch must be flushed before item 6 is fetched"
    );
    assert_eq!(flushes[1].ids, vec![6]);
}

#[tokio::test(start_paused = true)]
async fn test_interval_flushes_partial_batch() {
    // Items 1 and 2 arrive at once; item 3 takes 5s and is absent
    let fetcher = StubFetcher::only([1, 2]).with_delay(3, Duration::from_secs(5));
    let sink = Arc::new(MemorySink::new());
    let config = test_config(1, 3, 1, 10)
        .with_flush_interval_secs(1)
        .with_poll_interval_ms(100);

    let start = Instant::now();
    let pipeline = IngestPipeline::new(config, Arc::new(fetcher), sink.clone()).unwrap();
    let report = pipeline.run().await.unwrap();

    let flushes = sink.flushes();
    assert_eq!(flushes.len(), 1);
    assert_eq!(flushes[0].ids, vec![1, 2]);

    let flushed_after = flushes[0].at.duration_since(start);
    assert!(flushed_after >= Duration::from_secs(1), "flushed too early: {:?}", flushed_after);
    assert!(flushed_after < Duration::from_secs(2), "flushed too late: {:?}", flushed_after);
    assert_eq!(report.progress.processed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_no_flush_for_empty_batch() {
    let sink = Arc::new(MemorySink::new());
    let fetcher = StubFetcher::only([]).with_default_delay(Duration::from_secs(2));
    let config = test_config(1, 4, 2, 10).with_flush_interval_secs(1);

    let pipeline = IngestPipeline::new(config, Arc::new(fetcher), sink.clone()).unwrap();
    let report = pipeline.run().await.unwrap();

    assert!(sink.flushes().is_empty());
    assert_eq!(report.progress.processed, 4);
    assert_eq!(report.progress.succeeded, 0);
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_failed_flush_does_not_halt_processing() {
    let sink = Arc::new(MemorySink::failing_on(2));
    let pipeline = IngestPipeline::new(
        test_config(1, 20, 1, 5),
        Arc::new(StubFetcher::all()),
        sink.clone(),
    )
    .unwrap();

    let report = pipeline.run().await.unwrap();

    let flushes = sink.flushes();
    assert_eq!(flushes.len(), 4);
    assert!(!flushes[1].accepted);
    assert!(flushes[2].accepted && flushes[3].accepted);

    assert_eq!(report.progress.processed, 20);
    assert_eq!(report.progress.failed_flushes, 1);
    assert_eq!(report.progress.records_dropped, 5);
    assert_eq!(report.progress.records_stored, 15);
    assert_eq!(sink.rows().len(), 15);
}

#[tokio::test]
async fn test_panicking_item_does_not_stop_partition() {
    let fetcher = StubFetcher::all().with_panic_on(4);
    let sink = Arc::new(MemorySink::new());
    let pipeline =
        IngestPipeline::new(test_config(1, 10, 2, 3), Arc::new(fetcher), sink.clone()).unwrap();

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.progress.processed, 10);
    assert_eq!(report.progress.succeeded, 9);
    assert_eq!(report.workers.iter().map(|w| w.panicked).sum::<u64>(), 1);
    assert!(!sink.stored_ids().contains(&4));
    assert!(sink.stored_ids().contains(&5));
}

// ============================================================================
// Content bound
// ============================================================================

#[tokio::test]
async fn test_content_is_truncated_to_max_bytes() {
    let fetcher = StubFetcher::all().with_content_len(1_000);
    let sink = Arc::new(MemorySink::new());
    let config = test_config(1, 8, 2, 4).with_max_content_bytes(100);

    let pipeline = IngestPipeline::new(config, Arc::new(fetcher), sink.clone()).unwrap();
    pipeline.run().await.unwrap();

    let lens: Vec<usize> = sink.flushes().iter().flat_map(|f| f.content_lens.clone()).collect();
    assert_eq!(lens.len(), 8);
    assert!(lens.iter().all(|len| *len == 100));
}

#[tokio::test]
async fn test_short_content_is_untouched() {
    let fetcher = StubFetcher::all().with_content_len(40);
    let sink = Arc::new(MemorySink::new());
    let config = test_config(1, 3, 1, 4).with_max_content_bytes(100);

    let pipeline = IngestPipeline::new(config, Arc::new(fetcher), sink.clone()).unwrap();
    pipeline.run().await.unwrap();

    assert!(sink.rows().iter().all(|r| r.content.len() == 40));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_workers_and_flushes_what_was_fetched() {
    let fetcher = StubFetcher::all().with_default_delay(Duration::from_secs(1));
    let sink = Arc::new(MemorySink::new());
    let pipeline =
        IngestPipeline::new(test_config(1, 100, 2, 50), Arc::new(fetcher), sink.clone()).unwrap();

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        cancel.cancel();
    });

    let report = pipeline.run().await.unwrap();

    assert!(report.cancelled);
    assert!(!report.is_complete());
    assert!(report.progress.processed > 0);
    assert!(report.progress.processed < 100);
    assert_eq!(report.progress.records_stored, report.progress.succeeded);
    assert_eq!(sink.rows().len() as u64, report.progress.processed);
    assert!(report.workers.iter().all(|w| w.cancelled));
}

// ============================================================================
// Idempotence
// ============================================================================

/// Re-running a range against a non-deduplicating sink stores every item
/// again. This is expected: delivery is at-least-once.
#[tokio::test]
async fn test_rerun_produces_duplicate_rows() {
    let sink = Arc::new(MemorySink::new());

    for _ in 0..2 {
        let pipeline = IngestPipeline::new(
            test_config(1, 5, 2, 10),
            Arc::new(StubFetcher::all()),
            sink.clone(),
        )
        .unwrap();
        pipeline.run().await.unwrap();
    }

    assert_eq!(sink.rows().len(), 10);
    assert_eq!(sink.stored_ids(), vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
}
