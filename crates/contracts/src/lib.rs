//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the workspace: the
//! record/frame data model, the batch source traits, the error taxonomy and
//! the pipeline configuration.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are unsigned nanoseconds (`u64`) on the sequence clock
//! - Windows are half-open `[start, end)`

mod config;
mod error;
mod frame;
mod record;
mod schema;
mod source;
mod topic_name;

pub use config::*;
pub use error::*;
pub use frame::*;
pub use record::*;
pub use schema::*;
pub use source::{BatchSource, TopicHandle};
pub use topic_name::TopicName;

// Cell type of every frame column
pub use serde_json::Value;
