//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Recording file not found
    #[error("Recording not found: {path}")]
    RecordingNotFound { path: String },

    /// Neither the configuration nor the command line names a recording
    #[error("No recording configured (set source.recording or pass --recording)")]
    MissingRecording,

    /// Extraction, resampling or configuration failure
    #[error("Pipeline execution failed: {0}")]
    PipelineExecution(#[from] ContractError),

    /// Output destination could not be opened
    #[error("Failed to open output {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn recording_not_found(path: impl Into<String>) -> Self {
        Self::RecordingNotFound { path: path.into() }
    }

    pub fn output(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Output {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
