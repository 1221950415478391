//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::RunMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Output columns of the extraction, timestamp first
    pub columns: Vec<String>,

    /// Whether the window covered the whole range
    pub full_load: bool,

    /// Batches pulled from the source
    pub batches_fetched: u64,

    /// Rows that fell outside every emitted window
    pub rows_discarded: u64,

    /// Recording lines that arrived out of timestamp order
    pub out_of_order_records: usize,

    /// Stopped by a shutdown signal
    pub cancelled: bool,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Chunk, row and resampling aggregates
    pub metrics: RunMetricsAggregator,
}

impl PipelineStats {
    /// Rows written per second
    pub fn rows_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.metrics.rows_written as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary to stderr
    pub fn print_summary(&self) {
        eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
        eprintln!("║                    Pipeline Statistics                       ║");
        eprintln!("╚══════════════════════════════════════════════════════════════╝\n");

        eprintln!("📊 Overview");
        eprintln!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        eprintln!("   ├─ Columns: {}", self.columns.len());
        eprintln!("   ├─ Full load: {}", self.full_load);
        eprintln!("   ├─ Batches fetched: {}", self.batches_fetched);
        eprintln!("   ├─ Rows discarded: {}", self.rows_discarded);
        eprintln!("   ├─ Out-of-order records: {}", self.out_of_order_records);
        eprintln!("   ├─ Rows/s: {:.2}", self.rows_per_sec());
        eprintln!("   └─ Cancelled: {}", self.cancelled);

        eprintln!("\n📈 Run Metrics");
        eprint!("{}", self.metrics.summary());
        eprintln!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_sec() {
        let mut stats = PipelineStats {
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        stats.metrics.update_written(10);
        assert!((stats.rows_per_sec() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_zero_duration() {
        assert_eq!(PipelineStats::default().rows_per_sec(), 0.0);
    }
}
