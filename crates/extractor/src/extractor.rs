//! Windowed multi-topic extraction
//!
//! [`extract`] validates a request against a [`BatchSource`], opens one handle
//! per topic and returns [`WindowChunks`], a lazy iterator of time-ordered
//! [`Frame`]s. Each lane (handle + flattener + buffer) is pulled only as far as
//! the current window needs; rows past the window end stay buffered.

use std::collections::HashSet;

use contracts::{
    BatchSource, Column, ContractError, ExtractConfig, Frame, TopicHandle, TopicName,
    TopicSelection, Value, TIMESTAMP_COLUMN,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::buffer::TopicBuffer;
use crate::flatten::{ColumnFlattener, FlatRow};

const NANOS_PER_SEC: f64 = 1e9;

/// Extraction request
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    /// Topics and fields; `None` selects every topic of the source
    pub selection: Option<Vec<TopicSelection>>,
    /// Window duration (seconds)
    pub window_sec: f64,
    /// Inclusive start (ns); defaults to the source minimum
    pub start_ns: Option<u64>,
    /// Exclusive end (ns); defaults to just past the source maximum
    pub end_ns: Option<u64>,
}

impl ExtractRequest {
    pub fn new(window_sec: f64) -> Self {
        Self {
            selection: None,
            window_sec,
            start_ns: None,
            end_ns: None,
        }
    }

    pub fn with_selection(mut self, selection: Vec<TopicSelection>) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_range(mut self, start_ns: Option<u64>, end_ns: Option<u64>) -> Self {
        self.start_ns = start_ns;
        self.end_ns = end_ns;
        self
    }
}

impl From<&ExtractConfig> for ExtractRequest {
    fn from(config: &ExtractConfig) -> Self {
        Self {
            selection: (!config.topics.is_empty()).then(|| config.topics.clone()),
            window_sec: config.window_sec,
            start_ns: config.start_ns,
            end_ns: config.end_ns,
        }
    }
}

/// Effective half-open extraction range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ns: u64,
    pub end_ns: u64,
}

impl TimeRange {
    #[inline]
    pub fn duration_ns(&self) -> u64 {
        self.end_ns - self.start_ns
    }
}

/// Extraction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub batches_fetched: u64,
    pub chunks_emitted: u64,
    pub rows_emitted: u64,
    /// Rows outside the effective range, never emitted
    pub rows_discarded: u64,
    /// Windows evaluated, including empty ones
    pub windows: u64,
}

/// Convert a window duration to nanoseconds.
///
/// # Errors
/// [`ContractError::InvalidArgument`] when the duration is not finite, not
/// positive, or shorter than 1 ns.
pub fn window_ns(window_sec: f64) -> Result<u64, ContractError> {
    if !window_sec.is_finite() || window_sec <= 0.0 {
        return Err(ContractError::invalid_argument(
            "window_sec",
            format!("must be finite and > 0, got {window_sec}"),
        ));
    }
    // `as` saturates for durations beyond u64::MAX ns
    let ns = (window_sec * NANOS_PER_SEC) as u64;
    if ns == 0 {
        return Err(ContractError::invalid_argument(
            "window_sec",
            format!("{window_sec}s is shorter than 1ns"),
        ));
    }
    Ok(ns)
}

/// Clamp a requested range to what the source holds.
///
/// # Errors
/// [`ContractError::NoData`] when the source is empty or the clamped range is.
pub fn effective_range<S: BatchSource + ?Sized>(
    source: &S,
    start_ns: Option<u64>,
    end_ns: Option<u64>,
) -> Result<TimeRange, ContractError> {
    let (Some(min_ts), Some(max_ts)) = (source.min_timestamp_ns(), source.max_timestamp_ns())
    else {
        return Err(ContractError::no_data("source holds no samples"));
    };

    let upper = max_ts.saturating_add(1);
    let start = start_ns.map_or(min_ts, |s| s.max(min_ts));
    let end = end_ns.map_or(upper, |e| e.min(upper));

    if start >= end {
        return Err(ContractError::no_data(format!(
            "requested range [{}, {}) does not overlap data range [{min_ts}, {max_ts}]",
            start_ns.map_or_else(|| "-".to_string(), |s| s.to_string()),
            end_ns.map_or_else(|| "-".to_string(), |e| e.to_string()),
        )));
    }

    Ok(TimeRange {
        start_ns: start,
        end_ns: end,
    })
}

fn resolve_selection<S: BatchSource + ?Sized>(
    source: &S,
    selection: Option<&[TopicSelection]>,
) -> Result<Vec<TopicSelection>, ContractError> {
    let available = source.topics();
    let selection: Vec<TopicSelection> = match selection {
        Some(sel) if !sel.is_empty() => sel.to_vec(),
        _ => available.iter().cloned().map(TopicSelection::all).collect(),
    };

    let mut seen = HashSet::with_capacity(selection.len());
    for sel in &selection {
        if !available.contains(&sel.topic) {
            return Err(ContractError::unknown_topic(sel.topic.as_str()));
        }
        if !seen.insert(sel.topic.clone()) {
            return Err(ContractError::invalid_argument(
                "topics",
                format!("topic '{}' selected more than once", sel.topic),
            ));
        }
    }
    Ok(selection)
}

/// Validate `request` and start a windowed extraction over `source`.
///
/// All validation (window, range, topics, fields) happens here, before any
/// batch is pulled. Handles opened during a failed setup are closed.
#[instrument(
    name = "extractor_open",
    skip(source, request),
    fields(window_sec = request.window_sec)
)]
pub fn extract<S: BatchSource + ?Sized>(
    source: &S,
    request: &ExtractRequest,
) -> Result<WindowChunks, ContractError> {
    let window_ns = window_ns(request.window_sec)?;
    let range = effective_range(source, request.start_ns, request.end_ns)?;
    let selection = resolve_selection(source, request.selection.as_deref())?;

    let topics: Vec<TopicName> = selection.iter().map(|s| s.topic.clone()).collect();
    let handles = source.open(&topics, Some(range.start_ns), Some(range.end_ns))?;

    let mut lanes: Vec<Lane> = handles
        .into_iter()
        .map(|handle| Lane {
            handle: Some(handle),
            flattener: None,
            buffer: TopicBuffer::new(),
            exhausted: false,
        })
        .collect();

    if let Err(err) = build_flatteners(&mut lanes, &selection) {
        close_lanes(&mut lanes);
        return Err(err);
    }

    // the exclusive end sits one past the last sample; compare against the data span
    let span_ns = source
        .max_timestamp_ns()
        .map_or(range.end_ns, |max_ts| range.end_ns.min(max_ts))
        .saturating_sub(range.start_ns);
    let full_load = window_ns >= span_ns;
    if full_load {
        warn!(
            window_ns,
            span_ns,
            "window covers the whole range, loading everything into one chunk"
        );
    }

    info!(
        topics = lanes.len(),
        start_ns = range.start_ns,
        end_ns = range.end_ns,
        window_ns,
        full_load,
        "extraction started"
    );

    Ok(WindowChunks {
        lanes,
        range,
        window_ns,
        state: if full_load {
            State::FullLoad
        } else {
            State::Windowing {
                window_start: range.start_ns,
            }
        },
        full_load,
        stats: ExtractStats::default(),
    })
}

fn build_flatteners(lanes: &mut [Lane], selection: &[TopicSelection]) -> Result<(), ContractError> {
    let mut columns = HashSet::new();
    for lane in lanes.iter_mut() {
        let Some(handle) = lane.handle.as_ref() else {
            continue;
        };
        let fields = selection
            .iter()
            .find(|s| &s.topic == handle.topic())
            .and_then(|s| s.fields.as_deref());
        let flattener = ColumnFlattener::new(handle.topic().clone(), handle.schema(), fields)?;

        for name in flattener.column_names() {
            if !columns.insert(name.clone()) {
                return Err(ContractError::invalid_argument(
                    "topics",
                    format!("column '{name}' produced by more than one topic"),
                ));
            }
        }
        lane.flattener = Some(flattener);
    }
    Ok(())
}

/// One topic's pull state
struct Lane {
    handle: Option<Box<dyn TopicHandle>>,
    flattener: Option<ColumnFlattener>,
    buffer: TopicBuffer,
    exhausted: bool,
}

impl Lane {
    fn topic(&self) -> Option<&TopicName> {
        self.flattener.as_ref().map(ColumnFlattener::topic)
    }

    fn column_names(&self) -> &[String] {
        match &self.flattener {
            Some(flattener) => flattener.column_names(),
            None => &[],
        }
    }

    /// Pull batches until the buffer reaches `until` or the handle runs dry.
    /// `None` pulls to exhaustion.
    fn fill(&mut self, until: Option<u64>, stats: &mut ExtractStats) -> Result<(), ContractError> {
        while !self.exhausted {
            if let (Some(until), Some(max_ts)) = (until, self.buffer.max_timestamp_ns()) {
                if max_ts >= until {
                    break;
                }
            }
            let Some(handle) = self.handle.as_mut() else {
                self.exhausted = true;
                break;
            };

            match handle.fetch_next_batch()? {
                Some(batch) => {
                    stats.batches_fetched += 1;
                    metrics::counter!(
                        "extract_batches_fetched_total",
                        "topic" => handle.topic().to_string()
                    )
                    .increment(1);
                    trace!(topic = %handle.topic(), records = batch.len(), "batch fetched");
                    if let Some(flattener) = &self.flattener {
                        self.buffer.extend(flattener.flatten(batch));
                    }
                }
                None => {
                    debug!(topic = %handle.topic(), "topic exhausted");
                    self.exhausted = true;
                    self.close();
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(err) = handle.close() {
                warn!(topic = %handle.topic(), error = %err, "failed to close topic handle");
            }
        }
    }

    fn is_drained(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }
}

fn close_lanes(lanes: &mut [Lane]) {
    for lane in lanes {
        lane.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Windowing { window_start: u64 },
    FullLoad,
    /// Closing handles and accounting for leftovers
    Draining,
    Done,
}

/// Lazy sequence of window chunks
///
/// Yields non-empty [`Frame`]s in strictly increasing, non-overlapping time
/// order. Every frame has the `timestamp_ns` column followed by the columns of
/// each topic in selection order. A failure closes every handle, is yielded
/// once, and ends the sequence. A range that turns out to hold no sample ends
/// with a single [`ContractError::NoData`] instead of an empty sequence.
/// Dropping the iterator closes every handle.
pub struct WindowChunks {
    lanes: Vec<Lane>,
    range: TimeRange,
    window_ns: u64,
    state: State,
    full_load: bool,
    stats: ExtractStats,
}

impl WindowChunks {
    /// Whether windowing was disabled because one window covers the range
    pub fn is_full_load(&self) -> bool {
        self.full_load
    }

    pub fn range(&self) -> TimeRange {
        self.range
    }

    pub fn window_ns(&self) -> u64 {
        self.window_ns
    }

    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    /// Output column names, timestamp first
    pub fn column_names(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP_COLUMN.to_string())
            .chain(self.lanes.iter().flat_map(|l| l.column_names().iter().cloned()))
            .collect()
    }

    /// Number of open topic handles
    pub fn open_handles(&self) -> usize {
        self.lanes.iter().filter(|l| l.handle.is_some()).count()
    }

    /// Collect one window `[start, end)` into a frame.
    fn collect_window(&mut self, start: u64, end: u64, pull_until: Option<u64>) -> Result<Frame, ContractError> {
        self.stats.windows += 1;
        for lane in &mut self.lanes {
            lane.fill(pull_until, &mut self.stats)?;
        }

        let mut parts = Vec::with_capacity(self.lanes.len());
        for lane in &mut self.lanes {
            let split = lane.buffer.split_window(start, end);
            if split.discarded > 0 {
                self.stats.rows_discarded += split.discarded as u64;
                warn!(
                    topic = ?lane.topic(),
                    rows = split.discarded,
                    window_start = start,
                    "rows before the window start were discarded"
                );
            }
            parts.push(split.in_window);
        }

        merge_parts(&self.lanes, parts)
    }

    /// Start of the next window after `[.., window_end)`.
    ///
    /// Skips windows that cannot hold any row: when every lane has already
    /// been pulled past `window_end`, jump to the aligned window containing
    /// the earliest buffered row. `None` when nothing is left.
    fn next_window_start(&self, window_end: u64) -> Option<u64> {
        if self.lanes.iter().all(Lane::is_drained) {
            return None;
        }
        if self.lanes.iter().any(|l| !l.exhausted && l.buffer.is_empty()) {
            return Some(window_end);
        }
        let earliest = self
            .lanes
            .iter()
            .filter_map(|l| l.buffer.min_timestamp_ns())
            .min()?;
        if earliest <= window_end {
            return Some(window_end);
        }
        let offset = (earliest - self.range.start_ns) / self.window_ns * self.window_ns;
        Some(self.range.start_ns + offset)
    }

    fn drain(&mut self) {
        let mut leftover = 0u64;
        for lane in &mut self.lanes {
            leftover += lane.buffer.len() as u64;
            lane.buffer.clear();
            lane.close();
        }
        if leftover > 0 {
            self.stats.rows_discarded += leftover;
            warn!(
                rows = leftover,
                end_ns = self.range.end_ns,
                "rows past the range end were discarded"
            );
        }
        info!(
            chunks = self.stats.chunks_emitted,
            rows = self.stats.rows_emitted,
            batches = self.stats.batches_fetched,
            "extraction finished"
        );
    }

    fn fail(&mut self, err: ContractError) -> Option<Result<Frame, ContractError>> {
        warn!(error = %err, "extraction failed, closing topic handles");
        close_lanes(&mut self.lanes);
        self.state = State::Done;
        Some(Err(err))
    }

    fn record_chunk(&mut self, frame: &Frame) {
        let rows = frame.num_rows();
        self.stats.chunks_emitted += 1;
        self.stats.rows_emitted += rows as u64;
        metrics::counter!("extract_chunks_total").increment(1);
        metrics::histogram!("extract_chunk_rows").record(rows as f64);
        debug!(chunk = self.stats.chunks_emitted, rows, "chunk emitted");
    }
}

impl std::fmt::Debug for WindowChunks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowChunks")
            .field("range", &self.range)
            .field("window_ns", &self.window_ns)
            .field("state", &self.state)
            .field("open_handles", &self.open_handles())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Iterator for WindowChunks {
    type Item = Result<Frame, ContractError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::Windowing { window_start } => {
                    if window_start >= self.range.end_ns {
                        self.state = State::Draining;
                        continue;
                    }
                    let window_end = window_start
                        .saturating_add(self.window_ns)
                        .min(self.range.end_ns);

                    let frame = match self.collect_window(window_start, window_end, Some(window_end)) {
                        Ok(frame) => frame,
                        Err(err) => return self.fail(err),
                    };

                    self.state = match self.next_window_start(window_end) {
                        Some(next) => State::Windowing { window_start: next },
                        None => State::Draining,
                    };

                    if !frame.is_empty() {
                        self.record_chunk(&frame);
                        return Some(Ok(frame));
                    }
                }
                State::FullLoad => {
                    let frame = match self.collect_window(self.range.start_ns, self.range.end_ns, None) {
                        Ok(frame) => frame,
                        Err(err) => return self.fail(err),
                    };
                    self.state = State::Draining;

                    if !frame.is_empty() {
                        self.record_chunk(&frame);
                        return Some(Ok(frame));
                    }
                }
                State::Draining => {
                    self.drain();
                    self.state = State::Done;
                    if self.stats.chunks_emitted == 0 {
                        return Some(Err(ContractError::no_data(format!(
                            "range [{}, {}) holds no samples of the selected topics",
                            self.range.start_ns, self.range.end_ns
                        ))));
                    }
                }
                State::Done => return None,
            }
        }
    }
}

impl Drop for WindowChunks {
    fn drop(&mut self) {
        close_lanes(&mut self.lanes);
    }
}

/// Merge per-lane window rows into one frame sorted by timestamp.
///
/// The sort is stable over lanes in selection order, so rows of one topic keep
/// arrival order. Cells of topics without a sample at a row are null.
fn merge_parts(lanes: &[Lane], parts: Vec<Vec<FlatRow>>) -> Result<Frame, ContractError> {
    let mut rows: Vec<(usize, FlatRow)> = parts
        .into_iter()
        .enumerate()
        .flat_map(|(lane, rows)| rows.into_iter().map(move |row| (lane, row)))
        .collect();
    rows.sort_by_key(|(_, row)| row.timestamp_ns);

    let n = rows.len();
    let mut offsets = Vec::with_capacity(lanes.len());
    let mut columns = vec![Column::new(
        TIMESTAMP_COLUMN,
        Vec::with_capacity(n),
    )];
    for lane in lanes {
        offsets.push(columns.len());
        columns.extend(lane.column_names().iter().map(|name| Column::nulls(name.as_str(), n)));
    }

    for (idx, (lane, row)) in rows.into_iter().enumerate() {
        columns[0].values.push(Value::from(row.timestamp_ns));
        let offset = offsets[lane];
        for (j, value) in row.values.into_iter().enumerate() {
            columns[offset + j].values[idx] = value;
        }
    }

    Frame::new(columns)
}
