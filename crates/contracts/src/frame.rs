//! Frame - WindowedExtractor and SyncTransformer output
//!
//! Column-oriented table of JSON cells. `Value::Null` marks a missing sample.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ContractError;

/// Name of the shared timestamp column produced by the extractor
pub const TIMESTAMP_COLUMN: &str = "timestamp_ns";

/// Named column of nullable cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Column of `len` nulls
    pub fn nulls(name: impl Into<String>, len: usize) -> Self {
        Self::new(name, vec![Value::Null; len])
    }

    /// Column of unsigned integer timestamps
    pub fn timestamps(name: impl Into<String>, timestamps: &[u64]) -> Self {
        Self::new(name, timestamps.iter().map(|&t| Value::from(t)).collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of non-null cells
    pub fn non_null_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_null()).count()
    }
}

/// Table with equally sized, uniquely named columns.
///
/// Column order is preserved as inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    /// Build a frame, checking column lengths and name uniqueness.
    pub fn new(columns: Vec<Column>) -> Result<Self, ContractError> {
        let mut frame = Self::default();
        for column in columns {
            frame.push_column(column)?;
        }
        Ok(frame)
    }

    /// Frame with the given column names and zero rows
    pub fn empty_with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|n| Column::new(n, Vec::new()))
                .collect(),
        }
    }

    /// Append a column; its length must match the existing rows.
    pub fn push_column(&mut self, column: Column) -> Result<(), ContractError> {
        if self.column(&column.name).is_some() {
            return Err(ContractError::invalid_argument(
                "column",
                format!("duplicate column '{}'", column.name),
            ));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(ContractError::invalid_argument(
                    "column",
                    format!(
                        "column '{}' has {} rows, frame has {}",
                        column.name,
                        column.len(),
                        first.len()
                    ),
                ));
            }
        }
        self.columns.push(column);
        Ok(())
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// True when there are no rows
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Decode a column of non-negative integer timestamps.
    pub fn timestamps(&self, name: &str) -> Result<Vec<u64>, ContractError> {
        let column = self
            .column(name)
            .ok_or_else(|| ContractError::missing_timestamp_column(name))?;
        column
            .values
            .iter()
            .enumerate()
            .map(|(row, value)| {
                value
                    .as_u64()
                    .ok_or_else(|| ContractError::InvalidTimestamp {
                        column: name.to_string(),
                        row,
                        value: value.to_string(),
                    })
            })
            .collect()
    }

    /// Row `idx` as a JSON object keyed by column name.
    pub fn row(&self, idx: usize) -> Option<Map<String, Value>> {
        if idx >= self.num_rows() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.values[idx].clone()))
                .collect(),
        )
    }

    /// Iterate over rows as JSON objects.
    pub fn rows(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        (0..self.num_rows()).filter_map(move |idx| self.row(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_rejects_ragged_columns() {
        let result = Frame::new(vec![
            Column::timestamps(TIMESTAMP_COLUMN, &[1, 2, 3]),
            Column::new("/imu.x", vec![json!(1.0)]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_rejects_duplicate_names() {
        let result = Frame::new(vec![
            Column::timestamps(TIMESTAMP_COLUMN, &[1]),
            Column::timestamps(TIMESTAMP_COLUMN, &[2]),
        ]);
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_timestamps_decode() {
        let frame = Frame::new(vec![
            Column::timestamps(TIMESTAMP_COLUMN, &[0, 5, 10]),
            Column::new("v", vec![json!(1), Value::Null, json!(3)]),
        ])
        .unwrap();

        assert_eq!(frame.timestamps(TIMESTAMP_COLUMN).unwrap(), vec![0, 5, 10]);
        assert!(matches!(
            frame.timestamps("v"),
            Err(ContractError::InvalidTimestamp { row: 1, .. })
        ));
        assert!(matches!(
            frame.timestamps("missing"),
            Err(ContractError::MissingTimestampColumn { .. })
        ));
    }

    #[test]
    fn test_rows_as_objects() {
        let frame = Frame::new(vec![
            Column::timestamps(TIMESTAMP_COLUMN, &[7]),
            Column::new("/gps.lat", vec![json!(45.1)]),
        ])
        .unwrap();

        let rows: Vec<_> = frame.rows().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("/gps.lat"), Some(&json!(45.1)));
        assert_eq!(frame.column("/gps.lat").unwrap().non_null_count(), 1);
    }

    #[test]
    fn test_empty_with_columns() {
        let frame = Frame::empty_with_columns([TIMESTAMP_COLUMN, "a"]);
        assert!(frame.is_empty());
        assert_eq!(frame.num_columns(), 2);
    }
}
