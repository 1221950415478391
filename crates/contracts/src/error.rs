//! Layered error definitions
//!
//! Categorized by source: validation / no-data / source / config

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Validation Errors =====
    /// Topic not present in the source
    #[error("unknown topic '{topic}'")]
    UnknownTopic { topic: String },

    /// Requested field matches neither a leaf nor a group in the topic schema
    #[error("field '{field}' does not exist in topic '{topic}'")]
    FieldNotFound { topic: String, field: String },

    /// Timestamp column missing from a chunk
    #[error("unable to find time column '{column}' in chunk")]
    MissingTimestampColumn { column: String },

    /// Timestamp cell is null or not a non-negative integer
    #[error("invalid timestamp in column '{column}' at row {row}: {value}")]
    InvalidTimestamp {
        column: String,
        row: usize,
        value: String,
    },

    /// Argument out of its accepted domain
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    // ===== No-Data Errors =====
    /// Requested range holds no data
    #[error("no data: {message}")]
    NoData { message: String },

    // ===== Source Errors =====
    /// Failure reported by the upstream batch source
    #[error("source error on topic '{topic}': {message}")]
    Source {
        topic: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed line in a recorded sequence
    #[error("recording parse error at line {line}: {message}")]
    RecordingParse {
        line: usize,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create unknown topic error
    pub fn unknown_topic(topic: impl Into<String>) -> Self {
        Self::UnknownTopic {
            topic: topic.into(),
        }
    }

    /// Create field-not-found error
    pub fn field_not_found(topic: impl Into<String>, field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            topic: topic.into(),
            field: field.into(),
        }
    }

    /// Create missing timestamp column error
    pub fn missing_timestamp_column(column: impl Into<String>) -> Self {
        Self::MissingTimestampColumn {
            column: column.into(),
        }
    }

    /// Create invalid argument error
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create no-data error
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::NoData {
            message: message.into(),
        }
    }

    /// Create source error without an underlying cause
    pub fn source(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            topic: topic.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this is a caller-side validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownTopic { .. }
                | Self::FieldNotFound { .. }
                | Self::MissingTimestampColumn { .. }
                | Self::InvalidTimestamp { .. }
                | Self::InvalidArgument { .. }
        )
    }

    /// Whether the requested range held no data
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, ContractError>;
