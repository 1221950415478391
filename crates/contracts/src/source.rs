//! BatchSource trait - upstream sequence abstraction
//!
//! Defines the narrow pull interface the extractor consumes. Transport,
//! storage and sequence lifecycle stay behind it.

use crate::{Batch, ContractError, Schema, TopicName};

/// Per-topic pull handle
///
/// Yields ordered batches until exhausted. `close` releases whatever the
/// handle holds (stream, file, connection) and must be safe to call more than
/// once.
///
/// # Example
///
/// ```ignore
/// let mut handles = source.open(&topics, None, None)?;
/// for handle in &mut handles {
///     while let Some(batch) = handle.fetch_next_batch()? {
///         println!("{}: {} records", handle.topic(), batch.len());
///     }
///     handle.close()?;
/// }
/// ```
pub trait TopicHandle: Send {
    /// Topic served by this handle
    fn topic(&self) -> &TopicName;

    /// Payload schema of the topic, known before the first fetch
    fn schema(&self) -> &Schema;

    /// Pull the next batch; `Ok(None)` signals exhaustion.
    ///
    /// May block on I/O. Errors are propagated unchanged by the extractor.
    fn fetch_next_batch(&mut self) -> Result<Option<Batch>, ContractError>;

    /// Release the handle
    fn close(&mut self) -> Result<(), ContractError>;
}

/// Sequence-level batch source
///
/// Implementations: in-memory and replayed recordings in the `extractor`
/// crate; remote stores live outside this workspace.
pub trait BatchSource {
    /// Every topic the sequence holds
    fn topics(&self) -> Vec<TopicName>;

    /// Open one handle per requested topic, restricted to `[start, end)`.
    ///
    /// Handles are returned in request order. Unknown topics fail with
    /// [`ContractError::UnknownTopic`]. Topics without data may be omitted.
    fn open(
        &self,
        topics: &[TopicName],
        start_ts_ns: Option<u64>,
        end_ts_ns: Option<u64>,
    ) -> Result<Vec<Box<dyn TopicHandle>>, ContractError>;

    /// Smallest timestamp in the sequence, `None` when it holds no data
    fn min_timestamp_ns(&self) -> Option<u64>;

    /// Largest timestamp in the sequence, `None` when it holds no data
    fn max_timestamp_ns(&self) -> Option<u64>;
}
