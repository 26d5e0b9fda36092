//! # Event Log - Durable, Partitioned, Ordered Record Stream
//!
//! The ingestion gateway publishes admitted records here; detector replicas
//! consume them as members of a consumer group.
//!
//! ## Guarantees
//!
//! - **Per-partition ordering:** entries in one partition are delivered in
//!   offset order. Nothing is promised across partitions.
//! - **Keyed placement:** records with the same key always land in the same
//!   partition, so one source's history is seen in order by one member.
//! - **At-least-once consumption:** consumption resumes from the group's last
//!   committed offset; uncommitted entries are redelivered after a rebalance.
//! - **Exclusive ownership:** two members of a group never own the same
//!   partition in the same generation.
//!
//! ## Publish Path
//!
//! ```text
//!   publish() ──enqueue──→ [producer queue] ──→ broker task ──append──→ partition
//!       │                                           │
//!       └── AckHandle ◄──────── DeliveryReport ─────┤
//!                                                   └──→ DeliveryReports (Acknowledger)
//! ```
//!
//! `publish` returns once the record is enqueued. The enqueue is a single
//! cancel-safe step, so a cancelled caller never leaves a half-published
//! record. The final outcome arrives as a `DeliveryReport`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod entry;
pub mod error;
pub mod memory;
pub mod partitioner;
pub mod ports;
pub mod topic;

pub use entry::{AckHandle, DeliveryOutcome, DeliveryReport, DeliveryReports, LogEntry};
pub use error::LogError;
pub use memory::{InMemoryEventLog, LogConfig};
pub use partitioner::Partitioner;
pub use ports::{entry_stream, EventLog, LogConsumer};
pub use topic::{TopicMetadata, TopicSpec};

/// Default producer queue capacity before `publish` has to wait.
pub const DEFAULT_PRODUCER_QUEUE_CAPACITY: usize = 10_000;

/// Bootstrap address of the in-process backend.
pub const MEMORY_BOOTSTRAP: &str = "memory://";

/// Event log backends selectable through the bootstrap address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBackend {
    /// In-process log shared by all components of one node.
    Memory,
}

impl LogBackend {
    /// Resolve the backend from a bootstrap address.
    pub fn from_bootstrap(bootstrap: &str) -> Result<Self, LogError> {
        let scheme = bootstrap.split("://").next().unwrap_or_default();
        match scheme.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(LogBackend::Memory),
            _ => Err(LogError::UnsupportedBackend(bootstrap.to_string())),
        }
    }
}
