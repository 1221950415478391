//! Record / Batch - BatchSource output
//!
//! Timestamped structured records as pulled from an upstream sequence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One timestamped sample of a topic.
///
/// The topic is implied by the handle that produced the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Acquisition time (nanoseconds) - primary clock
    pub timestamp_ns: u64,

    /// Nested structured payload
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Record {
    /// Create a record from a timestamp and a JSON object payload.
    ///
    /// Non-object payloads are stored under a single `value` field.
    pub fn new(timestamp_ns: u64, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            timestamp_ns,
            payload,
        }
    }
}

/// Ordered batch of records from one topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Largest timestamp in the batch
    pub fn max_timestamp_ns(&self) -> Option<u64> {
        self.records.iter().map(|r| r.timestamp_ns).max()
    }
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_wraps_scalar_payload() {
        let record = Record::new(5, json!(1.5));
        assert_eq!(record.payload.get("value"), Some(&json!(1.5)));

        let empty = Record::new(6, Value::Null);
        assert!(empty.payload.is_empty());
    }

    #[test]
    fn test_batch_max_timestamp() {
        let batch = Batch::new(vec![
            Record::new(10, json!({"x": 1})),
            Record::new(30, json!({"x": 2})),
            Record::new(20, json!({"x": 3})),
        ]);
        assert_eq!(batch.max_timestamp_ns(), Some(30));
        assert_eq!(Batch::default().max_timestamp_ns(), None);
    }
}
