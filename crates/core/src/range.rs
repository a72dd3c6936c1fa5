//! Range scheduling for log queries.
//!
//! RPC providers cap how many blocks a single `eth_getLogs` call may cover, so every
//! scan over `[start, end]` is split into bounded sub-ranges. Backfill and live polling
//! both go through [`chunks`], which keeps the two phases from drifting apart.

use crate::types::ScanRange;

/// Split the inclusive interval `[start, end]` into contiguous [`ScanRange`]s.
///
/// Range boundaries fall on `start + k * max_size`: the first range is
/// `[start, start + max_size]` and every following range begins one block after the
/// previous end and spans `end - start = max_size - 1`, with the last range clamped to
/// `end`. Every range therefore satisfies `range.end - range.start <= max_size`, and the
/// ranges cover each height in `[start, end]` exactly once, in ascending order.
///
/// Returns an empty sequence when `start > end`. A `max_size` of zero is treated as one.
///
/// # Example
/// ```
/// # use transferwatch_core::{chunks, ScanRange};
/// let ranges: Vec<_> = chunks(0, 250, 100).collect();
/// assert_eq!(
///     ranges,
///     vec![
///         ScanRange::new(0, 100),
///         ScanRange::new(101, 200),
///         ScanRange::new(201, 250),
///     ]
/// );
/// ```
pub fn chunks(start: u64, end: u64, max_size: u64) -> ScanRanges {
    ScanRanges {
        next_start: (start <= end).then_some(start),
        end,
        max_size: max_size.max(1),
        first: true,
    }
}

/// Lazy iterator over the sub-ranges produced by [`chunks`].
///
/// Cloning the iterator restarts the remaining sequence from the same position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRanges {
    next_start: Option<u64>,
    end: u64,
    max_size: u64,
    first: bool,
}

impl Iterator for ScanRanges {
    type Item = ScanRange;

    fn next(&mut self) -> Option<ScanRange> {
        let start = self.next_start?;

        let span = if self.first {
            self.max_size
        } else {
            self.max_size - 1
        };
        self.first = false;

        let end = start.saturating_add(span).min(self.end);
        self.next_start = if end >= self.end { None } else { Some(end + 1) };

        Some(ScanRange::new(start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next_start {
            None => (0, Some(0)),
            Some(_) => (1, None),
        }
    }
}

impl std::iter::FusedIterator for ScanRanges {}
