//! Static partitioning of the ID space
//!
//! Each worker owns one contiguous partition for its whole lifetime, so
//! workers never coordinate. A slow partition only delays itself.

use gutenload_common::ItemId;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Inclusive, contiguous range of item IDs owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub index: usize,
    pub start: ItemId,
    pub end: ItemId,
}

impl Partition {
    pub fn item_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// IDs in ascending order
    pub fn ids(&self) -> std::ops::RangeInclusive<ItemId> {
        self.start..=self.end
    }
}

/// Split `[start, end]` into `min(worker_count, end - start + 1)` partitions.
///
/// Lengths differ by at most one and the shorter partitions come last.
pub fn partition_range(
    start: ItemId,
    end: ItemId,
    worker_count: usize,
) -> PipelineResult<Vec<Partition>> {
    if start == 0 {
        return Err(PipelineError::config("item IDs start at 1"));
    }
    if start > end {
        return Err(PipelineError::config(format!(
            "empty id range: {} > {}",
            start, end
        )));
    }
    if worker_count == 0 {
        return Err(PipelineError::config("worker count must be at least 1"));
    }

    let total = end - start + 1;
    let chunks = total.min(worker_count as u64);
    let base = total / chunks;
    let remainder = total % chunks;

    let mut partitions = Vec::with_capacity(chunks as usize);
    let mut next = start;

    for index in 0..chunks {
        let len = base + u64::from(index < remainder);
        let last = next + (len - 1);
        partitions.push(Partition {
            index: index as usize,
            start: next,
            end: last,
        });
        if last == end {
            break;
        }
        next = last + 1;
    }

    Ok(partitions)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_even_split() {
        let parts = partition_range(1, 20, 4).unwrap();
        let bounds: Vec<_> = parts.iter().map(|p| (p.start, p.end)).collect();
        assert_eq!(bounds, vec![(1, 5), (6, 10), (11, 15), (16, 20)]);
    }

    #[test]
    fn test_uneven_split_puts_shorter_last() {
        let parts = partition_range(1, 23, 4).unwrap();
        let lens: Vec<_> = parts.iter().map(Partition::item_count).collect();
        assert_eq!(lens, vec![6, 6, 6, 5]);
    }

    #[test]
    fn test_more_workers_than_items() {
        let parts = partition_range(5, 7, 10).unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.item_count() == 1));
    }

    #[test]
    fn test_single_worker_owns_everything() {
        let parts = partition_range(3, 70_000, 1).unwrap();
        assert_eq!(parts, vec![Partition { index: 0, start: 3, end: 70_000 }]);
    }

    #[test]
    fn test_range_ending_at_id_max() {
        let parts = partition_range(u64::MAX - 5, u64::MAX, 2).unwrap();
        let bounds: Vec<_> = parts.iter().map(|p| (p.start, p.end)).collect();
        assert_eq!(
            bounds,
            vec![(u64::MAX - 5, u64::MAX - 3), (u64::MAX - 2, u64::MAX)]
        );
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(partition_range(0, 10, 2).is_err());
        assert!(partition_range(10, 9, 2).is_err());
        assert!(partition_range(1, 10, 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_partitions_cover_range_exactly_once(
            start in 1u64..1_000,
            len in 1u64..2_000,
            workers in 1usize..64,
        ) {
            let end = start + len - 1;
            let parts = partition_range(start, end, workers).unwrap();

            prop_assert!(parts.len() <= workers);
            prop_assert_eq!(parts[0].start, start);
            prop_assert_eq!(parts[parts.len() - 1].end, end);

            for pair in parts.windows(2) {
                prop_assert_eq!(pair[0].end + 1, pair[1].start);
                prop_assert!(pair[0].item_count() >= pair[1].item_count());
            }

            let covered: u64 = parts.iter().map(Partition::item_count).sum();
            prop_assert_eq!(covered, len);
        }
    }
}
