//! # Error Types
//!
//! Error taxonomy shared by every component, plus the validation errors for
//! request records.

use thiserror::Error;

/// Coarse error classes. Every component error maps onto exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Log/store unreachable or timed out. Retried by the caller or surfaced
    /// as `failed`; never crashes the process.
    TransientInfrastructure,
    /// Missing or unrepresentable record fields. Rejected synchronously.
    MalformedInput,
    /// Cannot bind, cannot resolve a dependency address, invalid config.
    /// The process exits non-zero.
    IrrecoverableStartup,
}

impl ErrorClass {
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorClass::TransientInfrastructure)
    }
}

/// Implemented by every error type in the workspace.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

/// Errors raised while validating a request record or a stored flag value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("missing required field: {0}")]
    EmptyField(&'static str),

    /// A field exceeds its maximum length.
    #[error("field {field} exceeds {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    /// A field contains a character that cannot be carried losslessly.
    #[error("field {field} contains invalid character {character:?}")]
    InvalidCharacter { field: &'static str, character: char },

    /// Timestamps are Unix seconds and cannot be negative.
    #[error("negative timestamp: {0}")]
    NegativeTimestamp(i64),

    /// A stored flag value is neither `clear` nor `blocked`.
    #[error("unknown block state: {0}")]
    UnknownBlockState(String),
}

impl Classify for ValidationError {
    fn class(&self) -> ErrorClass {
        ErrorClass::MalformedInput
    }
}
