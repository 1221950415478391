//! JSON-lines recording replay
//!
//! One record per line:
//!
//! ```text
//! {"topic": "/imu", "timestamp_ns": 1000, "data": {"acc": {"x": 0.1}}}
//! ```
//!
//! Blank lines are skipped. Records of a topic that arrive out of timestamp
//! order are re-sorted (stable) with a warning.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use contracts::{ContractError, Record, Schema, TopicName, Value};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::MemorySource;

#[derive(Debug, Deserialize)]
struct RecordLine {
    topic: TopicName,
    timestamp_ns: u64,
    #[serde(default)]
    data: Value,
}

/// Per-topic recording summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSummary {
    pub topic: TopicName,
    pub samples: usize,
    pub first_ns: Option<u64>,
    pub last_ns: Option<u64>,
    pub schema: Schema,
}

/// Recorded sequence loaded into memory
#[derive(Debug, Clone, Default)]
pub struct Recording {
    topics: BTreeMap<TopicName, Vec<Record>>,
    out_of_order: usize,
}

impl Recording {
    /// Load a recording from a file.
    #[instrument(name = "recording_load", skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let file = File::open(path.as_ref())?;
        let recording = Self::from_reader(BufReader::new(file))?;
        info!(
            topics = recording.topics.len(),
            samples = recording.len(),
            "recording loaded"
        );
        Ok(recording)
    }

    /// Parse a recording from any buffered reader.
    ///
    /// # Errors
    /// [`ContractError::RecordingParse`] with the 1-based line number of the
    /// first malformed line, or [`ContractError::Io`].
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ContractError> {
        let mut recording = Self::default();
        let mut last_seen: BTreeMap<TopicName, u64> = BTreeMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parsed: RecordLine =
                serde_json::from_str(&line).map_err(|e| ContractError::RecordingParse {
                    line: idx + 1,
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                })?;

            if let Some(prev) = last_seen.get(&parsed.topic) {
                if parsed.timestamp_ns < *prev {
                    recording.out_of_order += 1;
                }
            }
            last_seen.insert(parsed.topic.clone(), parsed.timestamp_ns);

            recording
                .topics
                .entry(parsed.topic)
                .or_default()
                .push(Record::new(parsed.timestamp_ns, parsed.data));
        }

        if recording.out_of_order > 0 {
            warn!(
                records = recording.out_of_order,
                "recording has out-of-order records, re-sorting per topic"
            );
            for records in recording.topics.values_mut() {
                records.sort_by_key(|r| r.timestamp_ns);
            }
        }
        Ok(recording)
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.topics.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records that arrived out of order within their topic
    pub fn out_of_order(&self) -> usize {
        self.out_of_order
    }

    pub fn topics(&self) -> impl Iterator<Item = &TopicName> {
        self.topics.keys()
    }

    /// Per-topic sample counts, time bounds and inferred schemas
    pub fn summary(&self) -> Vec<TopicSummary> {
        self.topics
            .iter()
            .map(|(topic, records)| {
                let mut schema = Schema::default();
                for record in records {
                    schema.merge(&Schema::infer(&record.payload));
                }
                TopicSummary {
                    topic: topic.clone(),
                    samples: records.len(),
                    first_ns: records.first().map(|r| r.timestamp_ns),
                    last_ns: records.last().map(|r| r.timestamp_ns),
                    schema,
                }
            })
            .collect()
    }

    /// Serve the recording through a [`MemorySource`]
    pub fn into_source(self, batch_size: usize) -> MemorySource {
        let mut source = MemorySource::new(batch_size);
        for (topic, records) in self.topics {
            source.push_records(topic, records);
        }
        source
    }
}
