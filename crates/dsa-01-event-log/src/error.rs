//! Event log errors.

use shared_types::{Classify, ErrorClass};
use std::time::Duration;
use thiserror::Error;

/// Errors from publish, subscribe and topic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The topic was never provisioned.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Topic specification rejected (empty name, zero partitions, ...).
    #[error("invalid topic specification: {0}")]
    InvalidTopic(String),

    /// The producer queue stayed full for the whole publish timeout.
    #[error("producer queue full for {0:?}")]
    QueueFull(Duration),

    /// The log has been shut down.
    #[error("event log closed")]
    Closed,

    /// Consumer group name rejected.
    #[error("invalid consumer group: {0}")]
    InvalidGroup(String),

    /// The bootstrap address names a backend this build does not provide.
    #[error("unsupported event log backend: {0}")]
    UnsupportedBackend(String),
}

impl Classify for LogError {
    fn class(&self) -> ErrorClass {
        match self {
            LogError::UnknownTopic(_) | LogError::QueueFull(_) | LogError::Closed => {
                ErrorClass::TransientInfrastructure
            }
            LogError::InvalidTopic(_)
            | LogError::InvalidGroup(_)
            | LogError::UnsupportedBackend(_) => ErrorClass::IrrecoverableStartup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(LogError::Closed.class().is_transient());
        assert!(LogError::QueueFull(Duration::from_millis(5)).class().is_transient());
        assert_eq!(
            LogError::InvalidTopic("x".into()).class(),
            ErrorClass::IrrecoverableStartup
        );
    }
}
