//! PipelineConfig - Config Loader output
//!
//! Describes a full run: where records come from, what to extract, how to
//! resample, where rows go.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{TopicName, TIMESTAMP_COLUMN};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Record source
    #[serde(default)]
    #[validate(nested)]
    pub source: SourceConfig,

    /// Windowed extraction
    #[validate(nested)]
    pub extract: ExtractConfig,

    /// Resampling; sparse chunks are written as-is when absent
    #[serde(default)]
    #[validate(nested)]
    pub sync: Option<SyncConfig>,

    /// Output routing
    #[serde(default)]
    pub output: OutputConfig,
}

/// Record source configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// JSON-lines recording to replay
    #[serde(default)]
    pub recording: Option<PathBuf>,

    /// Records per pulled batch
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            recording: None,
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    256
}

/// Windowed extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtractConfig {
    /// Topic selection; empty means every topic with all fields
    #[serde(default)]
    pub topics: Vec<TopicSelection>,

    /// Window duration (seconds)
    #[serde(default = "default_window_sec")]
    #[validate(range(exclusive_min = 0.0))]
    pub window_sec: f64,

    /// Global start (ns, inclusive)
    #[serde(default)]
    pub start_ns: Option<u64>,

    /// Global end (ns, exclusive)
    #[serde(default)]
    pub end_ns: Option<u64>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            window_sec: default_window_sec(),
            start_ns: None,
            end_ns: None,
        }
    }
}

fn default_window_sec() -> f64 {
    5.0
}

/// One topic and optionally the fields to keep
///
/// A field is either a leaf path (`acceleration.x`) or a group whose leaf
/// descendants are all kept (`header`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSelection {
    pub topic: TopicName,

    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl TopicSelection {
    /// Every field of `topic`
    pub fn all(topic: impl Into<TopicName>) -> Self {
        Self {
            topic: topic.into(),
            fields: None,
        }
    }

    /// Only `fields` of `topic`
    pub fn fields<I, S>(topic: impl Into<TopicName>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topic: topic.into(),
            fields: Some(fields.into_iter().map(Into::into).collect()),
        }
    }
}

/// Resampling configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    /// Output rate (Hz), must be > 0
    #[validate(range(exclusive_min = 0.0))]
    pub target_fps: f64,

    /// Policy mapping sparse samples onto the grid
    #[serde(default)]
    pub policy: SyncPolicyConfig,

    /// Column holding nanosecond timestamps
    #[serde(default = "default_timestamp_column")]
    #[validate(length(min = 1))]
    pub timestamp_column: String,
}

impl SyncConfig {
    /// Hold policy over the default timestamp column
    pub fn new(target_fps: f64) -> Self {
        Self {
            target_fps,
            policy: SyncPolicyConfig::default(),
            timestamp_column: default_timestamp_column(),
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicyConfig) -> Self {
        self.policy = policy;
        self
    }
}

fn default_timestamp_column() -> String {
    TIMESTAMP_COLUMN.to_string()
}

/// Sync policy selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncPolicyConfig {
    /// Zero-order hold, no staleness limit
    #[default]
    Hold,
    /// Hold while the sample is at most `tolerance_ns` old
    AsOf { tolerance_ns: u64 },
    /// Keep only samples inside `(tick - step_ns, tick]`; defaults to the grid step
    Drop {
        #[serde(default)]
        step_ns: Option<u64>,
    },
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON-lines destination; stdout when absent
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Omit null cells from written rows
    #[serde(default)]
    pub skip_nulls: bool,
}
