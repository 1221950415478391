//! # Extractor
//!
//! Windowed multi-topic extraction over a [`contracts::BatchSource`].
//!
//! Responsibilities:
//! - Flatten nested payloads into namespaced leaf columns, applying field selection
//! - Pull each topic lazily, one window at a time, carrying rows across window boundaries
//! - Merge all topics into time-ordered, bounded-memory [`contracts::Frame`] chunks
//! - Release topic handles on completion, early drop and failure
//!
//! ## Usage Example
//!
//! ```ignore
//! use extractor::{extract, ExtractRequest, Recording};
//! use contracts::TopicSelection;
//!
//! let source = Recording::load("drive.jsonl")?.into_source(256);
//! let request = ExtractRequest::new(5.0)
//!     .with_selection(vec![TopicSelection::fields("/imu", ["acceleration"])]);
//!
//! for chunk in extract(&source, &request)? {
//!     let frame = chunk?;
//!     println!("{} rows", frame.num_rows());
//! }
//! ```

mod buffer;
mod extractor;
mod flatten;
mod mock;
mod replay;

// Re-exports
pub use buffer::{TopicBuffer, WindowSplit};
pub use extractor::{
    effective_range, extract, window_ns, ExtractRequest, ExtractStats, TimeRange, WindowChunks,
};
pub use flatten::{flatten_and_select, ColumnFlattener, FlatRow, SchemaTree};
pub use mock::{MemoryHandle, MemorySource};
pub use replay::{Recording, TopicSummary};
