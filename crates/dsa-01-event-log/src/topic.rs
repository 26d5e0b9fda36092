//! Topic specification and metadata.

use crate::error::LogError;

/// Requested topic layout. Comes from configuration, never hardcoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    /// Topic name.
    pub name: String,
    /// Number of partitions (>= 1).
    pub partitions: u32,
    /// Replication factor (>= 1).
    pub replication_factor: u16,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: u32, replication_factor: u16) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
        }
    }

    /// Reject specifications no backend can honour.
    pub fn validate(&self) -> Result<(), LogError> {
        if self.name.trim().is_empty() {
            return Err(LogError::InvalidTopic("topic name cannot be empty".into()));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(LogError::InvalidTopic(format!(
                "topic name {:?} contains whitespace",
                self.name
            )));
        }
        if self.partitions == 0 {
            return Err(LogError::InvalidTopic("partitions cannot be 0".into()));
        }
        if self.replication_factor == 0 {
            return Err(LogError::InvalidTopic("replication factor cannot be 0".into()));
        }
        Ok(())
    }
}

/// Layout of an existing topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u16,
    /// `true` if `ensure_topic` created the topic, `false` if it existed.
    pub created: bool,
}
