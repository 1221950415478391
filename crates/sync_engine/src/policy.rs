//! Sync policies
//!
//! A policy maps a tick grid and sparse `(timestamp, value)` samples onto one
//! nullable value per tick. Every policy starts from the same lookup: the
//! latest sample at or before the tick, the rightmost one on equal
//! timestamps. They differ only in how stale that sample may be.

use contracts::{SyncPolicyConfig, Value};

/// Resampling policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Zero-order hold with no staleness limit
    #[default]
    Hold,
    /// Hold while `tick - sample_ts <= tolerance_ns`
    AsOf { tolerance_ns: u64 },
    /// Keep only samples with `tick - sample_ts < step_ns`
    Drop { step_ns: u64 },
}

impl SyncPolicy {
    /// Build from configuration; `drop` without a step uses `grid_step_ns`.
    pub fn from_config(config: SyncPolicyConfig, grid_step_ns: u64) -> Self {
        match config {
            SyncPolicyConfig::Hold => Self::Hold,
            SyncPolicyConfig::AsOf { tolerance_ns } => Self::AsOf { tolerance_ns },
            SyncPolicyConfig::Drop { step_ns } => Self::Drop {
                step_ns: step_ns.unwrap_or(grid_step_ns),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hold => "hold",
            Self::AsOf { .. } => "as_of",
            Self::Drop { .. } => "drop",
        }
    }

    #[inline]
    fn accepts(&self, age_ns: u64) -> bool {
        match *self {
            Self::Hold => true,
            Self::AsOf { tolerance_ns } => age_ns <= tolerance_ns,
            Self::Drop { step_ns } => age_ns < step_ns,
        }
    }

    /// Resample `(timestamps, values)` onto `grid`.
    ///
    /// `grid` and `timestamps` must be non-decreasing; `timestamps` and
    /// `values` have equal length. Returns exactly `grid.len()` cells, null
    /// where no acceptable sample exists.
    pub fn apply(&self, grid: &[u64], timestamps: &[u64], values: &[Value]) -> Vec<Value> {
        debug_assert_eq!(timestamps.len(), values.len());
        let samples = timestamps.len().min(values.len());

        let mut out = Vec::with_capacity(grid.len());
        // count of samples with ts <= current tick
        let mut upto = 0usize;
        for &tick in grid {
            while upto < samples && timestamps[upto] <= tick {
                upto += 1;
            }
            let cell = match upto.checked_sub(1) {
                Some(idx) if self.accepts(tick - timestamps[idx]) => values[idx].clone(),
                _ => Value::Null,
            };
            out.push(cell);
        }
        out
    }
}
