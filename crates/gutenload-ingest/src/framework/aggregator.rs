//! Result aggregation between workers and the batch loader
//!
//! Two independent unbounded MPSC channels: one for records, one for
//! progress ticks. Workers hold cloned senders; the loader owns the single
//! receiver and drains without blocking so it can interleave time-based
//! flush checks.
//!
//! The channels are unbounded. With roughly ten network-bound producers the
//! loader drains far faster than they fill, so memory stays small in
//! practice, but nothing enforces it.

use gutenload_common::{FetchedRecord, ProgressTick};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Create a connected sender/receiver pair
pub fn channel() -> (AggregatorSender, AggregatorReceiver) {
    let (records_tx, records_rx) = mpsc::unbounded_channel();
    let (ticks_tx, ticks_rx) = mpsc::unbounded_channel();

    (
        AggregatorSender {
            records: records_tx,
            ticks: ticks_tx,
        },
        AggregatorReceiver {
            records: records_rx,
            ticks: ticks_rx,
            records_closed: false,
            ticks_closed: false,
        },
    )
}

/// Producer side, cloned into every worker
#[derive(Debug, Clone)]
pub struct AggregatorSender {
    records: UnboundedSender<FetchedRecord>,
    ticks: UnboundedSender<ProgressTick>,
}

impl AggregatorSender {
    /// Returns false when the loader is gone
    pub fn send_record(&self, record: FetchedRecord) -> bool {
        self.records.send(record).is_ok()
    }

    /// Returns false when the loader is gone
    pub fn send_tick(&self, tick: ProgressTick) -> bool {
        self.ticks.send(tick).is_ok()
    }
}

/// Ticks observed by one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounts {
    pub succeeded: u64,
    pub failed: u64,
}

impl TickCounts {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Consumer side, owned by the batch loader
#[derive(Debug)]
pub struct AggregatorReceiver {
    records: UnboundedReceiver<FetchedRecord>,
    ticks: UnboundedReceiver<ProgressTick>,
    records_closed: bool,
    ticks_closed: bool,
}

impl AggregatorReceiver {
    /// Take every tick currently queued
    pub fn drain_ticks(&mut self) -> TickCounts {
        let mut counts = TickCounts::default();

        loop {
            match self.ticks.try_recv() {
                Ok(ProgressTick::Success) => counts.succeeded += 1,
                Ok(ProgressTick::Failure) => counts.failed += 1,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.ticks_closed = true;
                    break;
                }
            }
        }

        counts
    }

    /// Move queued records into `batch` until it holds `limit` records.
    ///
    /// Returns the number of records moved.
    pub fn drain_records(&mut self, batch: &mut Vec<FetchedRecord>, limit: usize) -> usize {
        let mut moved = 0;

        while batch.len() < limit {
            match self.records.try_recv() {
                Ok(record) => {
                    batch.push(record);
                    moved += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.records_closed = true;
                    break;
                }
            }
        }

        moved
    }

    /// All senders are gone and both channels have been fully drained
    pub fn is_exhausted(&self) -> bool {
        self.records_closed && self.ticks_closed
    }
}
