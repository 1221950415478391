//! Stateful chunk resampler.

use std::collections::HashMap;

use contracts::{Column, ContractError, Frame, SyncConfig, Value};
use tracing::{debug, instrument};

use crate::grid::GridScheduler;
use crate::policy::SyncPolicy;

/// Resamples sparse chunks onto a uniform grid, one chunk at a time.
///
/// Keeps a single grid cursor and, per column, the latest non-null sample
/// seen so far. Feeding consecutive chunks of one stream yields the same
/// ticks and values as feeding the stream in one piece.
#[derive(Debug, Clone)]
pub struct SyncTransformer {
    grid: GridScheduler,
    policy: SyncPolicy,
    timestamp_column: String,
    /// Latest `(timestamp, value)` per column
    last_values: HashMap<String, (u64, Value)>,
}

impl SyncTransformer {
    /// # Errors
    /// [`ContractError::InvalidArgument`] for a rate that is not finite,
    /// not positive, or finer than 1 ns, or an empty timestamp column name.
    pub fn new(config: SyncConfig) -> Result<Self, ContractError> {
        let grid = GridScheduler::from_fps(config.target_fps)?;
        if config.timestamp_column.is_empty() {
            return Err(ContractError::invalid_argument(
                "timestamp_column",
                "must not be empty",
            ));
        }
        let policy = SyncPolicy::from_config(config.policy, grid.step_ns());

        debug!(
            step_ns = grid.step_ns(),
            policy = policy.name(),
            timestamp_column = %config.timestamp_column,
            "sync transformer created"
        );

        Ok(Self {
            grid,
            policy,
            timestamp_column: config.timestamp_column,
            last_values: HashMap::new(),
        })
    }

    #[inline]
    pub fn step_ns(&self) -> u64 {
        self.grid.step_ns()
    }

    /// Next tick the grid will emit, `None` until anchored
    #[inline]
    pub fn next_tick_ns(&self) -> Option<u64> {
        self.grid.cursor()
    }

    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    /// Cached latest sample of `column`
    pub fn cached_value(&self, column: &str) -> Option<(u64, &Value)> {
        self.last_values.get(column).map(|(ts, v)| (*ts, v))
    }

    /// Anchor the grid at the chunk's first timestamp unless already anchored.
    pub fn fit(&mut self, chunk: &Frame) -> Result<(), ContractError> {
        let timestamps = self.chunk_timestamps(chunk)?;
        if let Some(&first) = timestamps.first() {
            self.grid.anchor(first);
        }
        Ok(())
    }

    /// Resample `chunk` onto the grid.
    ///
    /// The output holds the timestamp column (the ticks) followed by every
    /// other input column in input order. When no tick falls inside the chunk
    /// the result has the input's columns and zero rows; samples of such a
    /// chunk still update the per-column cache.
    #[instrument(
        level = "trace",
        name = "sync_transform",
        skip(self, chunk),
        fields(rows = chunk.num_rows())
    )]
    pub fn transform(&mut self, chunk: &Frame) -> Result<Frame, ContractError> {
        let timestamps = self.chunk_timestamps(chunk)?;
        let extent = timestamps.first().zip(timestamps.last()).map(|(&f, &l)| (f, l));
        let ticks = self.grid.advance(extent);

        let mut columns = Vec::with_capacity(chunk.num_columns());
        columns.push(Column::timestamps(self.timestamp_column.as_str(), &ticks));
        let mut null_slots = 0usize;

        for column in chunk.columns() {
            if column.name == self.timestamp_column {
                continue;
            }

            let cached = self.last_values.get(&column.name);
            let capacity = column.non_null_count() + usize::from(cached.is_some());
            let mut sample_ts = Vec::with_capacity(capacity);
            let mut sample_values = Vec::with_capacity(capacity);
            if let Some((ts, value)) = cached {
                sample_ts.push(*ts);
                sample_values.push(value.clone());
            }
            for (ts, value) in timestamps.iter().zip(&column.values) {
                if !value.is_null() {
                    sample_ts.push(*ts);
                    sample_values.push(value.clone());
                }
            }

            let values = if sample_ts.is_empty() {
                vec![Value::Null; ticks.len()]
            } else {
                self.policy.apply(&ticks, &sample_ts, &sample_values)
            };
            null_slots += values.iter().filter(|v| v.is_null()).count();

            if let (Some(&ts), Some(value)) = (sample_ts.last(), sample_values.pop()) {
                self.last_values.insert(column.name.clone(), (ts, value));
            }
            columns.push(Column::new(column.name.as_str(), values));
        }

        debug!(
            ticks = ticks.len(),
            columns = columns.len() - 1,
            cached = self.last_values.len(),
            next_tick_ns = ?self.grid.cursor(),
            "chunk resampled"
        );

        if ticks.is_empty() {
            return Ok(Frame::empty_with_columns(
                columns.into_iter().map(|c| c.name),
            ));
        }

        metrics::counter!("sync_ticks_total").increment(ticks.len() as u64);
        metrics::counter!("sync_null_slots_total").increment(null_slots as u64);
        Frame::new(columns)
    }

    /// [`fit`](Self::fit) then [`transform`](Self::transform)
    pub fn fit_transform(&mut self, chunk: &Frame) -> Result<Frame, ContractError> {
        self.fit(chunk)?;
        self.transform(chunk)
    }

    /// Forget the grid origin and every cached value
    pub fn reset(&mut self) {
        self.grid.reset();
        self.last_values.clear();
        debug!("sync transformer reset");
    }

    fn chunk_timestamps(&self, chunk: &Frame) -> Result<Vec<u64>, ContractError> {
        let timestamps = chunk.timestamps(&self.timestamp_column)?;
        if let Some(row) = timestamps.windows(2).position(|w| w[1] < w[0]) {
            return Err(ContractError::invalid_argument(
                "chunk",
                format!(
                    "column '{}' is not sorted at row {}",
                    self.timestamp_column,
                    row + 1
                ),
            ));
        }
        Ok(timestamps)
    }
}
