//! Drift-free uniform tick grid.

use contracts::ContractError;

const NANOS_PER_SEC: f64 = 1e9;

/// Grid step for `target_fps`, truncated to whole nanoseconds.
///
/// # Errors
/// [`ContractError::InvalidArgument`] when the rate is not finite, not
/// positive, or too high for a 1 ns step.
pub fn step_from_fps(target_fps: f64) -> Result<u64, ContractError> {
    if !target_fps.is_finite() || target_fps <= 0.0 {
        return Err(ContractError::invalid_argument(
            "target_fps",
            format!("must be finite and > 0, got {target_fps}"),
        ));
    }
    let step = (NANOS_PER_SEC / target_fps) as u64;
    if step == 0 {
        return Err(ContractError::invalid_argument(
            "target_fps",
            format!("{target_fps} Hz is finer than 1ns"),
        ));
    }
    Ok(step)
}

/// Ticks covering a chunk and the cursor for the next one.
///
/// `extent` is the chunk's `(first, last)` timestamp, `None` for an empty
/// chunk. Ticks start at `cursor` when set, else at the chunk's first
/// timestamp, and run while `tick <= last`. When no tick fits, the cursor is
/// returned unchanged.
pub fn next_grid(extent: Option<(u64, u64)>, step_ns: u64, cursor: Option<u64>) -> (Vec<u64>, Option<u64>) {
    let Some((first_ts, last_ts)) = extent else {
        return (Vec::new(), cursor);
    };
    let origin = cursor.unwrap_or(first_ts);
    if origin > last_ts || step_ns == 0 {
        return (Vec::new(), cursor);
    }

    let count = (last_ts - origin) / step_ns + 1;
    let ticks: Vec<u64> = (0..count).map(|k| origin + k * step_ns).collect();
    let next = ticks.last().map(|t| t.saturating_add(step_ns));
    (ticks, next)
}

/// Grid state carried across chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridScheduler {
    step_ns: u64,
    cursor: Option<u64>,
}

impl GridScheduler {
    pub fn new(step_ns: u64) -> Self {
        Self {
            step_ns,
            cursor: None,
        }
    }

    pub fn from_fps(target_fps: f64) -> Result<Self, ContractError> {
        step_from_fps(target_fps).map(Self::new)
    }

    #[inline]
    pub fn step_ns(&self) -> u64 {
        self.step_ns
    }

    /// Next expected tick, `None` before the first grid
    #[inline]
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Anchor the grid at `ts` unless it is already anchored.
    pub fn anchor(&mut self, ts: u64) {
        self.cursor.get_or_insert(ts);
    }

    /// Ticks for a chunk spanning `extent`, advancing the cursor.
    pub fn advance(&mut self, extent: Option<(u64, u64)>) -> Vec<u64> {
        let (ticks, cursor) = next_grid(extent, self.step_ns, self.cursor);
        self.cursor = cursor;
        ticks
    }

    pub fn reset(&mut self) {
        self.cursor = None;
    }
}
