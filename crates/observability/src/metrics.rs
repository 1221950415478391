//! Run metrics
//!
//! Prometheus recorders for the CLI pipeline plus an in-memory aggregator
//! used to print the end-of-run summary. Extraction and sync internals record
//! their own counters (`extract_*`, `sync_*`) where the work happens.

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// Record one extracted chunk
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_chunk_extracted;
///
/// for chunk in chunks {
///     let frame = chunk?;
///     record_chunk_extracted(frame.num_rows(), frame.num_columns(), elapsed_ms);
/// }
/// ```
pub fn record_chunk_extracted(rows: usize, columns: usize, latency_ms: f64) {
    counter!("topic_syncer_chunks_total").increment(1);
    counter!("topic_syncer_rows_extracted_total").increment(rows as u64);
    gauge!("topic_syncer_chunk_columns").set(columns as f64);
    histogram!("topic_syncer_chunk_rows").record(rows as f64);
    histogram!("topic_syncer_extract_latency_ms").record(latency_ms);
}

/// Record one resampled chunk
pub fn record_sync_output(ticks: usize, null_slots: usize, slots: usize) {
    counter!("topic_syncer_ticks_total").increment(ticks as u64);
    if slots > 0 {
        histogram!("topic_syncer_null_ratio").record(null_slots as f64 / slots as f64);
    }
}

/// Record rows handed to the output writer
pub fn record_rows_written(rows: usize) {
    counter!("topic_syncer_rows_written_total").increment(rows as u64);
}

/// Per-run metrics aggregator
///
/// Aggregates in memory for the summary printed when a run ends.
#[derive(Debug, Clone, Default)]
pub struct RunMetricsAggregator {
    /// Chunks extracted
    pub chunks: u64,

    /// Sparse rows extracted
    pub rows_extracted: u64,

    /// Rows written (dense when resampling)
    pub rows_written: u64,

    /// Grid ticks produced
    pub ticks: u64,

    /// Null cells in resampled output
    pub null_slots: u64,

    /// Cells in resampled output, excluding the timestamp column
    pub slots: u64,

    /// Rows per chunk
    pub chunk_rows: RunningStats,

    /// Time to pull and assemble one chunk (ms)
    pub extract_latency_ms: RunningStats,

    /// Non-null cells per output column
    pub column_fill: BTreeMap<String, u64>,
}

impl RunMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one extracted chunk
    pub fn update_chunk(&mut self, rows: usize, latency_ms: f64) {
        self.chunks += 1;
        self.rows_extracted += rows as u64;
        self.chunk_rows.push(rows as f64);
        self.extract_latency_ms.push(latency_ms);
    }

    /// Account for one resampled chunk
    pub fn update_sync(&mut self, ticks: usize, null_slots: usize, slots: usize) {
        self.ticks += ticks as u64;
        self.null_slots += null_slots as u64;
        self.slots += slots as u64;
    }

    /// Account for `filled` non-null cells written to `column`
    pub fn update_column(&mut self, column: &str, filled: usize) {
        match self.column_fill.get_mut(column) {
            Some(count) => *count += filled as u64,
            None => {
                self.column_fill.insert(column.to_string(), filled as u64);
            }
        }
    }

    pub fn update_written(&mut self, rows: usize) {
        self.rows_written += rows as u64;
    }

    /// Build the summary report
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            chunks: self.chunks,
            rows_extracted: self.rows_extracted,
            rows_written: self.rows_written,
            ticks: self.ticks,
            null_rate: if self.slots > 0 {
                self.null_slots as f64 / self.slots as f64 * 100.0
            } else {
                0.0
            },
            chunk_rows: StatsSummary::from(&self.chunk_rows),
            extract_latency_ms: StatsSummary::from(&self.extract_latency_ms),
            column_fill: self.column_fill.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub chunks: u64,
    pub rows_extracted: u64,
    pub rows_written: u64,
    pub ticks: u64,
    /// Percentage of null cells in resampled output
    pub null_rate: f64,
    pub chunk_rows: StatsSummary,
    pub extract_latency_ms: StatsSummary,
    pub column_fill: BTreeMap<String, u64>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Run Summary ===")?;
        writeln!(f, "Chunks: {}", self.chunks)?;
        writeln!(f, "Rows extracted: {}", self.rows_extracted)?;
        writeln!(f, "Rows written: {}", self.rows_written)?;
        if self.ticks > 0 {
            writeln!(f, "Grid ticks: {} (null cells {:.2}%)", self.ticks, self.null_rate)?;
        }
        writeln!(f, "Rows per chunk: {}", self.chunk_rows)?;
        writeln!(f, "Extract latency (ms): {}", self.extract_latency_ms)?;

        if !self.column_fill.is_empty() {
            writeln!(f, "Non-null cells per column:")?;
            for (column, count) in &self.column_fill {
                writeln!(f, "  {column}: {count}")?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
