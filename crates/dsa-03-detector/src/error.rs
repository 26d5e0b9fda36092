//! Detector errors.

use dsa_01_event_log::LogError;
use shared_types::{Classify, CodecError, ErrorClass};
use std::time::Duration;
use thiserror::Error;

/// Rule evaluation failure on a single record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("record is missing {0}")]
    MissingField(&'static str),

    #[error("invalid rule parameter: {0}")]
    InvalidParameter(String),
}

impl Classify for RuleError {
    fn class(&self) -> ErrorClass {
        match self {
            RuleError::MissingField(_) => ErrorClass::MalformedInput,
            RuleError::InvalidParameter(_) => ErrorClass::IrrecoverableStartup,
        }
    }
}

/// Failure to deliver a block command to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Gateway unreachable or transport failure.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete in time.
    #[error("block call timed out after {0:?}")]
    Timeout(Duration),

    /// The gateway answered but did not report success.
    #[error("gateway rejected block: {0}")]
    Rejected(String),

    /// The gateway endpoint could not be configured.
    #[error("invalid gateway endpoint: {0}")]
    InvalidEndpoint(String),
}

impl Classify for SinkError {
    fn class(&self) -> ErrorClass {
        match self {
            SinkError::Unavailable(_) | SinkError::Timeout(_) | SinkError::Rejected(_) => {
                ErrorClass::TransientInfrastructure
            }
            SinkError::InvalidEndpoint(_) => ErrorClass::IrrecoverableStartup,
        }
    }
}

/// Errors surfaced by the detector loop and pool.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("payload decode failed: {0}")]
    Decode(#[from] CodecError),

    #[error("rule evaluation failed: {0}")]
    Rule(#[from] RuleError),

    #[error("block command failed after {attempts} attempts: {source}")]
    Block {
        attempts: u32,
        #[source]
        source: SinkError,
    },

    #[error("event log error: {0}")]
    Log(#[from] LogError),

    #[error("invalid detector configuration: {0}")]
    Config(String),
}

impl Classify for DetectorError {
    fn class(&self) -> ErrorClass {
        match self {
            DetectorError::Decode(e) => e.class(),
            DetectorError::Rule(e) => e.class(),
            DetectorError::Block { source, .. } => source.class(),
            DetectorError::Log(e) => e.class(),
            DetectorError::Config(_) => ErrorClass::IrrecoverableStartup,
        }
    }
}
