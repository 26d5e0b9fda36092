//! Block store errors.

use shared_types::{Classify, ErrorClass};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the command.
    #[error("block store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not finish within the configured bound.
    #[error("block store operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored value is neither `clear` nor `blocked`.
    #[error("corrupt flag for {key}: {value:?}")]
    CorruptValue { key: String, value: String },

    /// The store address could not be parsed.
    #[error("invalid block store address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The store address names a backend this build does not provide.
    #[error("unsupported block store scheme: {0}")]
    UnsupportedScheme(String),
}

impl Classify for StoreError {
    fn class(&self) -> ErrorClass {
        match self {
            StoreError::Unavailable(_) | StoreError::Timeout(_) => {
                ErrorClass::TransientInfrastructure
            }
            StoreError::CorruptValue { .. } => ErrorClass::MalformedInput,
            StoreError::InvalidAddress { .. } | StoreError::UnsupportedScheme(_) => {
                ErrorClass::IrrecoverableStartup
            }
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}
