//! Per-topic carry-over buffer
//!
//! Holds flattened rows pulled from a handle but not yet emitted. Rows are
//! kept in arrival order; the window mask does not rely on them being sorted.

use std::collections::VecDeque;

use crate::flatten::FlatRow;

/// Rows of one topic pending emission
#[derive(Debug, Default)]
pub struct TopicBuffer {
    rows: VecDeque<FlatRow>,
    max_ts: Option<u64>,
}

/// Outcome of masking a buffer against one window
#[derive(Debug, Default)]
pub struct WindowSplit {
    /// Rows inside `[start, end)`
    pub in_window: Vec<FlatRow>,
    /// Rows below `start`, never emitted
    pub discarded: usize,
}

impl TopicBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = FlatRow>) {
        for row in rows {
            self.max_ts = Some(self.max_ts.map_or(row.timestamp_ns, |m| m.max(row.timestamp_ns)));
            self.rows.push_back(row);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Largest buffered timestamp
    #[inline]
    pub fn max_timestamp_ns(&self) -> Option<u64> {
        self.max_ts
    }

    /// Smallest buffered timestamp
    pub fn min_timestamp_ns(&self) -> Option<u64> {
        self.rows.iter().map(|r| r.timestamp_ns).min()
    }

    /// Take the rows inside `[start, end)`.
    ///
    /// Rows at or past `end` stay buffered for later windows. Rows before
    /// `start` can never be emitted and are dropped.
    pub fn split_window(&mut self, start: u64, end: u64) -> WindowSplit {
        let mut split = WindowSplit::default();
        let mut carry = VecDeque::with_capacity(self.rows.len());

        for row in self.rows.drain(..) {
            if row.timestamp_ns < start {
                split.discarded += 1;
            } else if row.timestamp_ns < end {
                split.in_window.push(row);
            } else {
                carry.push_back(row);
            }
        }

        self.max_ts = carry.iter().map(|r| r.timestamp_ns).max();
        self.rows = carry;
        split
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.max_ts = None;
    }
}
