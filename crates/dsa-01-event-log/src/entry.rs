//! Log entries, delivery reports and acknowledgement handles.

use std::fmt;
use tokio::sync::{mpsc, oneshot};

/// A record read back from the log with its log-assigned position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Final outcome of an accepted publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Appended at `(partition, offset)`.
    Delivered { partition: u32, offset: u64 },
    /// Never appended.
    Failed { partition: u32, reason: String },
}

/// Publish-result notification, one per accepted publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub topic: String,
    pub key: Option<String>,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }
}

impl fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            DeliveryOutcome::Delivered { partition, offset } => {
                write!(f, "{}[{}]@{}", self.topic, partition, offset)
            }
            DeliveryOutcome::Failed { partition, reason } => {
                write!(f, "{}[{}] failed: {}", self.topic, partition, reason)
            }
        }
    }
}

/// Handle returned by `publish` once the log accepted the write.
///
/// Dropping it is fine: the same report is also sent to `DeliveryReports`.
#[derive(Debug)]
pub struct AckHandle {
    topic: String,
    key: Option<String>,
    partition: u32,
    receiver: oneshot::Receiver<DeliveryReport>,
}

impl AckHandle {
    pub(crate) fn new(
        topic: String,
        key: Option<String>,
        partition: u32,
        receiver: oneshot::Receiver<DeliveryReport>,
    ) -> Self {
        Self {
            topic,
            key,
            partition,
            receiver,
        }
    }

    /// Partition chosen for the record.
    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the final delivery report.
    pub async fn delivered(self) -> DeliveryReport {
        match self.receiver.await {
            Ok(report) => report,
            Err(_) => DeliveryReport {
                topic: self.topic,
                key: self.key,
                outcome: DeliveryOutcome::Failed {
                    partition: self.partition,
                    reason: "event log dropped the record".into(),
                },
            },
        }
    }
}

/// Stream of delivery reports, drained by the acknowledger.
#[derive(Debug)]
pub struct DeliveryReports {
    receiver: mpsc::UnboundedReceiver<DeliveryReport>,
}

impl DeliveryReports {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<DeliveryReport>) -> Self {
        Self { receiver }
    }

    /// Next report, or `None` once the log is gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<DeliveryReport> {
        self.receiver.recv().await
    }

    /// Next report if one is already queued.
    pub fn try_recv(&mut self) -> Option<DeliveryReport> {
        self.receiver.try_recv().ok()
    }
}
