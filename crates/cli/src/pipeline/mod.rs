//! Pipeline orchestration module.

mod orchestrator;
mod sink;
mod stats;

pub use orchestrator::{CancelToken, Pipeline, RunConfig};
pub use sink::RowSink;
pub use stats::PipelineStats;
