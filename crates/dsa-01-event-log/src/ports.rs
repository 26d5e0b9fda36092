//! Event log ports.
//!
//! The gateway depends on [`EventLog`] for publishing, the detector on
//! [`LogConsumer`] for reading. Backends implement both.

use crate::entry::{AckHandle, LogEntry};
use crate::error::LogError;
use crate::topic::{TopicMetadata, TopicSpec};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;

/// Producer and consumer-group side of the log.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Create the topic if absent. Safe to call repeatedly.
    async fn ensure_topic(&self, spec: &TopicSpec) -> Result<TopicMetadata, LogError>;

    /// Enqueue a record for append.
    ///
    /// Returns once the log has accepted the record. Waits at most the
    /// configured publish timeout for queue space, then fails with
    /// `QueueFull`. Cancelling the call never leaves a partial record.
    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<AckHandle, LogError>;

    /// Join `group` on `topic`.
    ///
    /// The consumer resumes from the group's committed offsets, or from the
    /// earliest entry when nothing was committed. Dropping it leaves the group.
    async fn subscribe(&self, topic: &str, group: &str) -> Result<Box<dyn LogConsumer>, LogError>;
}

/// One member of a consumer group.
#[async_trait]
pub trait LogConsumer: Send {
    /// Next entry from an owned partition, or `None` if nothing arrived
    /// within `timeout`. A timeout is not an error.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<LogEntry>, LogError>;

    /// Mark `entry` processed. The group resumes after it.
    fn commit(&mut self, entry: &LogEntry) -> Result<(), LogError>;

    /// Redeliver `entry` (and everything after it in its partition) on
    /// a later poll.
    fn rewind(&mut self, entry: &LogEntry);

    /// Partitions owned in the current generation.
    fn assignment(&self) -> Vec<u32>;

    fn member_id(&self) -> u64;
}

/// Adapt a consumer into a stream of entries.
///
/// Each entry is committed when the stream advances past it, so an entry is
/// committed only after the caller finished with it. Empty polls are skipped.
pub fn entry_stream(
    consumer: Box<dyn LogConsumer>,
    poll_timeout: Duration,
) -> BoxStream<'static, Result<LogEntry, LogError>> {
    let state: (Box<dyn LogConsumer>, Option<LogEntry>) = (consumer, None);
    stream::unfold(state, move |(mut consumer, previous)| async move {
        if let Some(done) = previous {
            if let Err(e) = consumer.commit(&done) {
                return Some((Err(e), (consumer, None)));
            }
        }
        loop {
            match consumer.poll(poll_timeout).await {
                Ok(Some(entry)) => {
                    let next = entry.clone();
                    return Some((Ok(entry), (consumer, Some(next))));
                }
                Ok(None) => continue,
                Err(LogError::Closed) => return None,
                Err(e) => return Some((Err(e), (consumer, None))),
            }
        }
    })
    .boxed()
}
