//! Pipeline orchestrator - coordinates all components.
//!
//! recording -> windowed extraction -> optional resampling -> JSON-lines rows

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use contracts::{Frame, PipelineConfig, TIMESTAMP_COLUMN};
use extractor::{ExtractRequest, Recording};
use sync_engine::SyncTransformer;
use tracing::{info, instrument, warn};

use super::{PipelineStats, RowSink};
use crate::error::{CliError, Result};

/// Run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The loaded pipeline configuration
    pub pipeline: PipelineConfig,

    /// Maximum number of chunks to process (None = unlimited)
    pub max_chunks: Option<u64>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Cooperative stop flag, checked between chunks
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: RunConfig,
    cancel: CancelToken,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::default(),
        }
    }

    /// Token that stops the run after the chunk in progress
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the pipeline to completion, cancellation, or the chunk limit
    pub fn run(self) -> Result<PipelineStats> {
        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let pipeline = &self.config.pipeline;
        let path = pipeline
            .source
            .recording
            .as_ref()
            .ok_or(CliError::MissingRecording)?;
        if !path.exists() {
            return Err(CliError::recording_not_found(path.display().to_string()));
        }

        let recording = Recording::load(path)?;
        let mut sink = RowSink::open(pipeline.output.path.as_deref(), pipeline.output.skip_nulls)?;
        self.run_with(recording, &mut sink)
    }

    /// Drive `recording` through extraction and resampling into `sink`.
    #[instrument(name = "pipeline_run", skip(self, recording, sink), fields(samples = recording.len()))]
    pub fn run_with(&self, recording: Recording, sink: &mut RowSink) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let pipeline = &self.config.pipeline;

        let out_of_order = recording.out_of_order();
        let source = recording.into_source(pipeline.source.batch_size);
        let request = ExtractRequest::from(&pipeline.extract);

        let mut chunks = extractor::extract(&source, &request)?;
        let mut transformer = pipeline
            .sync
            .clone()
            .map(SyncTransformer::new)
            .transpose()?;

        let timestamp_column = transformer
            .as_ref()
            .map_or(TIMESTAMP_COLUMN, |t| t.timestamp_column())
            .to_string();

        let mut stats = PipelineStats {
            columns: chunks.column_names(),
            full_load: chunks.is_full_load(),
            out_of_order_records: out_of_order,
            ..Default::default()
        };

        info!(
            columns = stats.columns.len(),
            full_load = stats.full_load,
            sync = transformer.is_some(),
            "Pipeline started"
        );

        loop {
            if self.cancel.is_cancelled() {
                warn!(chunks = stats.metrics.chunks, "Cancellation requested, stopping");
                stats.cancelled = true;
                break;
            }
            if let Some(max) = self.config.max_chunks {
                if stats.metrics.chunks >= max {
                    info!(max_chunks = max, "Chunk limit reached");
                    break;
                }
            }

            let pulled_at = Instant::now();
            let Some(chunk) = chunks.next() else {
                break;
            };
            let chunk = chunk?;
            let latency_ms = pulled_at.elapsed().as_secs_f64() * 1000.0;

            observability::record_chunk_extracted(chunk.num_rows(), chunk.num_columns(), latency_ms);
            stats.metrics.update_chunk(chunk.num_rows(), latency_ms);

            let output = match transformer.as_mut() {
                Some(transformer) => {
                    let dense = transformer.fit_transform(&chunk)?;
                    let (nulls, slots) = null_slots(&dense, &timestamp_column);
                    observability::record_sync_output(dense.num_rows(), nulls, slots);
                    stats.metrics.update_sync(dense.num_rows(), nulls, slots);
                    dense
                }
                None => chunk,
            };

            for column in output.columns() {
                if column.name != timestamp_column {
                    stats.metrics.update_column(&column.name, column.non_null_count());
                }
            }

            let written = sink.write_frame(&output)?;
            observability::record_rows_written(written);
            stats.metrics.update_written(written);
        }

        sink.finish()?;
        info!(rows = sink.rows(), "Output flushed");

        let extract_stats = chunks.stats();
        stats.batches_fetched = extract_stats.batches_fetched;
        stats.rows_discarded = extract_stats.rows_discarded;
        // closes any handle still open after an early stop
        drop(chunks);

        stats.duration = start_time.elapsed();
        Ok(stats)
    }
}

/// `(null cells, total cells)` outside the timestamp column
fn null_slots(frame: &Frame, timestamp_column: &str) -> (usize, usize) {
    frame
        .columns()
        .iter()
        .filter(|c| c.name != timestamp_column)
        .fold((0, 0), |(nulls, slots), c| {
            (nulls + c.len() - c.non_null_count(), slots + c.len())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ExtractConfig, SyncConfig, TopicSelection};
    use std::io::Write;
    use std::sync::Mutex;

    const SEC: u64 = 1_000_000_000;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn rows(&self) -> Vec<serde_json::Value> {
            let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
        }
    }

    fn recording() -> Recording {
        let mut lines = String::new();
        for i in 0..10u64 {
            lines.push_str(&format!(
                "{{\"topic\":\"/imu\",\"timestamp_ns\":{},\"data\":{{\"acc\":{{\"x\":{}}}}}}}\n",
                i * SEC / 2,
                i
            ));
        }
        for i in 0..3u64 {
            lines.push_str(&format!(
                "{{\"topic\":\"/gps\",\"timestamp_ns\":{},\"data\":{{\"lat\":{}}}}}\n",
                i * 2 * SEC,
                i * 10
            ));
        }
        Recording::from_reader(lines.as_bytes()).unwrap()
    }

    fn run_config(sync: Option<SyncConfig>) -> RunConfig {
        RunConfig {
            pipeline: PipelineConfig {
                version: Default::default(),
                source: Default::default(),
                extract: ExtractConfig {
                    topics: vec![TopicSelection::all("/imu"), TopicSelection::all("/gps")],
                    window_sec: 1.0,
                    ..Default::default()
                },
                sync,
                output: Default::default(),
            },
            max_chunks: None,
            metrics_port: None,
        }
    }

    #[test]
    fn test_sparse_run_writes_every_sample() {
        let buf = SharedBuf::default();
        let mut sink = RowSink::from_writer(Box::new(buf.clone()), false);
        let stats = Pipeline::new(run_config(None))
            .run_with(recording(), &mut sink)
            .unwrap();

        assert_eq!(stats.metrics.chunks, 5);
        assert_eq!(stats.metrics.rows_written, 13);
        assert!(!stats.cancelled);
        assert_eq!(buf.rows().len(), 13);
        assert_eq!(stats.metrics.column_fill.get("/gps.lat"), Some(&3));
    }

    #[test]
    fn test_sync_run_writes_dense_grid() {
        let buf = SharedBuf::default();
        let mut sink = RowSink::from_writer(Box::new(buf.clone()), false);
        let stats = Pipeline::new(run_config(Some(SyncConfig::new(2.0))))
            .run_with(recording(), &mut sink)
            .unwrap();

        // ticks every 0.5s from 0 to 4.5s
        let rows = buf.rows();
        assert_eq!(rows.len(), 10);
        assert_eq!(stats.metrics.ticks, 10);
        assert_eq!(rows[3]["timestamp_ns"], serde_json::json!(3 * SEC / 2));
        assert_eq!(rows[3]["/gps.lat"], serde_json::json!(0));
        assert_eq!(rows[9]["/gps.lat"], serde_json::json!(20));
        assert_eq!(stats.metrics.null_slots, 0);
    }

    #[test]
    fn test_chunk_limit() {
        let mut config = run_config(None);
        config.max_chunks = Some(2);
        let buf = SharedBuf::default();
        let mut sink = RowSink::from_writer(Box::new(buf.clone()), false);
        let stats = Pipeline::new(config).run_with(recording(), &mut sink).unwrap();

        assert_eq!(stats.metrics.chunks, 2);
        assert!(!stats.cancelled);
    }

    #[test]
    fn test_cancel_before_start() {
        let buf = SharedBuf::default();
        let mut sink = RowSink::from_writer(Box::new(buf.clone()), false);
        let pipeline = Pipeline::new(run_config(None));
        pipeline.cancel_handle().cancel();
        let stats = pipeline.run_with(recording(), &mut sink).unwrap();

        assert!(stats.cancelled);
        assert_eq!(stats.metrics.chunks, 0);
        assert!(buf.rows().is_empty());
    }

    #[test]
    fn test_missing_recording() {
        let pipeline = Pipeline::new(run_config(None));
        assert!(matches!(pipeline.run(), Err(CliError::MissingRecording)));
    }

    #[test]
    fn test_unknown_topic_fails() {
        let mut config = run_config(None);
        config.pipeline.extract.topics.push(TopicSelection::all("/lidar"));
        let mut sink = RowSink::from_writer(Box::new(SharedBuf::default()), false);
        let err = Pipeline::new(config)
            .run_with(recording(), &mut sink)
            .unwrap_err();
        assert!(matches!(err, CliError::PipelineExecution(_)));
    }
}
