//! In-memory batch source
//!
//! Serves pre-loaded records per topic in fixed-size batches. Used for tests
//! and as the backing store of replayed recordings.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use contracts::{Batch, BatchSource, ContractError, Record, Schema, TopicHandle, TopicName};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
struct TopicData {
    schema: Schema,
    records: Vec<Record>,
}

/// In-memory [`BatchSource`]
///
/// Topics are reported in name order. Every opened handle is counted until it
/// is closed, so tests can assert that nothing leaked.
#[derive(Debug, Clone)]
pub struct MemorySource {
    batch_size: usize,
    topics: BTreeMap<TopicName, TopicData>,
    fail_after: HashMap<TopicName, usize>,
    open_handles: Arc<AtomicUsize>,
}

impl MemorySource {
    /// Create an empty source serving `batch_size` records per batch (at least 1).
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            topics: BTreeMap::new(),
            fail_after: HashMap::new(),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add records to `topic`, widening its inferred schema.
    ///
    /// Records are served in the order given.
    pub fn with_topic(mut self, topic: impl Into<TopicName>, records: Vec<Record>) -> Self {
        self.push_records(topic.into(), records);
        self
    }

    pub(crate) fn push_records(&mut self, topic: TopicName, records: Vec<Record>) {
        let data = self.topics.entry(topic).or_default();
        for record in &records {
            data.schema.merge(&Schema::infer(&record.payload));
        }
        data.records.extend(records);
    }

    /// Make `topic` fail on the fetch after `batches` successful ones
    pub fn fail_after(mut self, topic: impl Into<TopicName>, batches: usize) -> Self {
        self.fail_after.insert(topic.into(), batches);
        self
    }

    /// Handles opened and not yet closed
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn schema(&self, topic: &str) -> Option<&Schema> {
        self.topics.get(topic).map(|d| &d.schema)
    }

    pub fn record_count(&self, topic: &str) -> Option<usize> {
        self.topics.get(topic).map(|d| d.records.len())
    }

    /// (first, last) timestamp of `topic`
    pub fn time_bounds(&self, topic: &str) -> Option<(u64, u64)> {
        let records = &self.topics.get(topic)?.records;
        let first = records.iter().map(|r| r.timestamp_ns).min()?;
        let last = records.iter().map(|r| r.timestamp_ns).max()?;
        Some((first, last))
    }

    fn all_timestamps(&self) -> impl Iterator<Item = u64> + '_ {
        self.topics
            .values()
            .flat_map(|d| d.records.iter().map(|r| r.timestamp_ns))
    }
}

impl BatchSource for MemorySource {
    fn topics(&self) -> Vec<TopicName> {
        self.topics.keys().cloned().collect()
    }

    fn open(
        &self,
        topics: &[TopicName],
        start_ts_ns: Option<u64>,
        end_ts_ns: Option<u64>,
    ) -> Result<Vec<Box<dyn TopicHandle>>, ContractError> {
        let start = start_ts_ns.unwrap_or(0);
        let end = end_ts_ns.unwrap_or(u64::MAX);

        // validate everything before counting any handle as open
        let mut selected = Vec::with_capacity(topics.len());
        for topic in topics {
            let data = self
                .topics
                .get(topic)
                .ok_or_else(|| ContractError::unknown_topic(topic.as_str()))?;
            selected.push((topic, data));
        }

        let handles = selected
            .into_iter()
            .map(|(topic, data)| {
                let records: Vec<Record> = data
                    .records
                    .iter()
                    .filter(|r| r.timestamp_ns >= start && r.timestamp_ns < end)
                    .cloned()
                    .collect();
                debug!(topic = %topic, records = records.len(), start, end, "memory handle opened");
                self.open_handles.fetch_add(1, Ordering::SeqCst);

                Box::new(MemoryHandle {
                    topic: topic.clone(),
                    schema: data.schema.clone(),
                    records: records.into_iter(),
                    batch_size: self.batch_size,
                    fail_after: self.fail_after.get(topic).copied(),
                    fetched: 0,
                    open: Some(self.open_handles.clone()),
                }) as Box<dyn TopicHandle>
            })
            .collect();
        Ok(handles)
    }

    fn min_timestamp_ns(&self) -> Option<u64> {
        self.all_timestamps().min()
    }

    fn max_timestamp_ns(&self) -> Option<u64> {
        self.all_timestamps().max()
    }
}

/// Handle over one topic of a [`MemorySource`]
#[derive(Debug)]
pub struct MemoryHandle {
    topic: TopicName,
    schema: Schema,
    records: std::vec::IntoIter<Record>,
    batch_size: usize,
    fail_after: Option<usize>,
    fetched: usize,
    /// Shared open-handle counter, taken on close
    open: Option<Arc<AtomicUsize>>,
}

impl TopicHandle for MemoryHandle {
    fn topic(&self) -> &TopicName {
        &self.topic
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn fetch_next_batch(&mut self) -> Result<Option<Batch>, ContractError> {
        if self.open.is_none() {
            return Err(ContractError::source(self.topic.as_str(), "handle is closed"));
        }
        if self.fail_after.is_some_and(|n| self.fetched >= n) {
            return Err(ContractError::source(
                self.topic.as_str(),
                format!("injected failure after {} batches", self.fetched),
            ));
        }

        let batch: Vec<Record> = self.records.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            return Ok(None);
        }
        self.fetched += 1;
        trace!(topic = %self.topic, records = batch.len(), "memory batch served");
        Ok(Some(Batch::new(batch)))
    }

    fn close(&mut self) -> Result<(), ContractError> {
        if let Some(counter) = self.open.take() {
            counter.fetch_sub(1, Ordering::SeqCst);
            trace!(topic = %self.topic, "memory handle closed");
        }
        Ok(())
    }
}
