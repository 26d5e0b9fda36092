//! Gateway error types with JSON-RPC 2.0 error codes.

use dsa_01_event_log::LogError;
use dsa_02_block_store::StoreError;
use serde::Serialize;
use shared_types::{Classify, CodecError, ErrorClass, ValidationError};
use std::fmt;

use super::config::ConfigError;

/// Standard JSON-RPC 2.0 error codes
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const LIMIT_EXCEEDED: i32 = -32005;
}

/// JSON-RPC protocol error.
///
/// Only protocol problems become an `ApiError`. Admit/Block failures are
/// reported as a `failed` status result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(details: impl fmt::Display) -> Self {
        Self::new(codes::PARSE_ERROR, format!("Parse error: {details}"))
    }

    pub fn invalid_request(details: impl fmt::Display) -> Self {
        Self::new(codes::INVALID_REQUEST, format!("Invalid request: {details}"))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(details: impl fmt::Display) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("Invalid params: {details}"))
    }

    pub fn internal(details: impl fmt::Display) -> Self {
        Self::new(codes::INTERNAL_ERROR, format!("Internal error: {details}"))
    }

    pub fn batch_too_large(max: usize) -> Self {
        Self::new(
            codes::LIMIT_EXCEEDED,
            format!("Batch too large: at most {max} requests"),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ApiError", 2)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

/// Why an `Admit` or `Block` did not complete.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed request: {0}")]
    Malformed(#[from] ValidationError),

    #[error("payload encoding failed: {0}")]
    Encode(#[from] CodecError),

    #[error("block store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("block store circuit open")]
    CircuitOpen,

    #[error("event log unavailable: {0}")]
    Log(#[from] LogError),
}

impl Classify for IngestError {
    fn class(&self) -> ErrorClass {
        match self {
            IngestError::Malformed(_) | IngestError::Encode(_) => ErrorClass::MalformedInput,
            IngestError::Store(e) => e.class(),
            IngestError::CircuitOpen => ErrorClass::TransientInfrastructure,
            IngestError::Log(e) => e.class(),
        }
    }
}

/// Gateway-level errors (startup and serving)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("server bind error on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("server error: {0}")]
    Serve(String),
}

impl Classify for GatewayError {
    fn class(&self) -> ErrorClass {
        match self {
            GatewayError::Config(_) | GatewayError::Bind { .. } => ErrorClass::IrrecoverableStartup,
            GatewayError::Serve(_) => ErrorClass::TransientInfrastructure,
        }
    }
}
