//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Ingestion**: `RequestRecord`, `AdmissionDecision`, `AdmitOutcome`
//! - **Block-list**: `BlockState`, `FlagLookup`
//! - **RPC boundary**: `RpcStatus`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// Maximum accepted length of a source address, in bytes.
pub const MAX_SOURCE_ADDRESS_LEN: usize = 255;

/// Maximum accepted length of a query target or record kind, in bytes.
pub const MAX_FIELD_LEN: usize = 1024;

// =============================================================================
// CLUSTER A: INGESTION
// =============================================================================

/// A single telemetry-like request observed at the edge.
///
/// Immutable once created. Produced by the gateway, carried as the payload of
/// a log entry and evaluated by the detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Textual source address (e.g. `10.0.0.70`).
    pub source_address: String,
    /// Queried name (e.g. `api.mywebsite.com`).
    pub query_target: String,
    /// Record kind requested (e.g. `A`, `AAAA`).
    pub record_kind: String,
    /// Unix timestamp in seconds when the request was observed.
    pub observed_at: i64,
}

impl RequestRecord {
    /// Build a record from its four fields.
    pub fn new(
        source_address: impl Into<String>,
        query_target: impl Into<String>,
        record_kind: impl Into<String>,
        observed_at: i64,
    ) -> Self {
        Self {
            source_address: source_address.into(),
            query_target: query_target.into(),
            record_kind: record_kind.into(),
            observed_at,
        }
    }

    /// Check the record for missing or unrepresentable fields.
    ///
    /// A record that fails validation must be rejected at admission and
    /// never published.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_source_address(&self.source_address)?;
        validate_field("query_target", &self.query_target, MAX_FIELD_LEN)?;
        validate_field("record_kind", &self.record_kind, MAX_FIELD_LEN)?;
        if self.observed_at < 0 {
            return Err(ValidationError::NegativeTimestamp(self.observed_at));
        }
        Ok(())
    }
}

/// Validate a source address as accepted by both `Admit` and `Block`.
///
/// The address is used verbatim as the block-list key, so surrounding
/// whitespace is rejected rather than trimmed.
pub fn validate_source_address(address: &str) -> Result<(), ValidationError> {
    validate_field("source_address", address, MAX_SOURCE_ADDRESS_LEN)?;
    let padding = address
        .chars()
        .next()
        .filter(|c| c.is_whitespace())
        .or_else(|| address.chars().last().filter(|c| c.is_whitespace()));
    if let Some(character) = padding {
        return Err(ValidationError::InvalidCharacter {
            field: "source_address",
            character,
        });
    }
    if address.contains(',') {
        return Err(ValidationError::InvalidCharacter {
            field: "source_address",
            character: ',',
        });
    }
    Ok(())
}

fn validate_field(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if value.len() > max {
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(())
}

/// Ephemeral per-request admission decision.
///
/// `Blocked` iff a block flag exists for the source and is `blocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Source may be admitted.
    Clear,
    /// Source is on the block-list.
    Blocked,
}

impl From<FlagLookup> for AdmissionDecision {
    fn from(lookup: FlagLookup) -> Self {
        match lookup {
            FlagLookup::Blocked => AdmissionDecision::Blocked,
            FlagLookup::Clear | FlagLookup::Absent => AdmissionDecision::Clear,
        }
    }
}

/// Result of a successful `Admit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// The event log accepted the write.
    Accepted,
    /// The source is blocked; nothing was published.
    Blocked,
}

// =============================================================================
// CLUSTER B: BLOCK-LIST
// =============================================================================

/// Stored state of a block flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Clear,
    Blocked,
}

impl BlockState {
    /// Value stored in the block store for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockState::Clear => "clear",
            BlockState::Blocked => "blocked",
        }
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clear" => Ok(BlockState::Clear),
            "blocked" => Ok(BlockState::Blocked),
            other => Err(ValidationError::UnknownBlockState(other.to_string())),
        }
    }
}

/// Outcome of a block store lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagLookup {
    /// A flag exists and is `clear`.
    Clear,
    /// A flag exists and is `blocked`.
    Blocked,
    /// No flag stored for the key.
    Absent,
}

impl FlagLookup {
    pub fn is_blocked(&self) -> bool {
        matches!(self, FlagLookup::Blocked)
    }
}

impl From<BlockState> for FlagLookup {
    fn from(state: BlockState) -> Self {
        match state {
            BlockState::Clear => FlagLookup::Clear,
            BlockState::Blocked => FlagLookup::Blocked,
        }
    }
}

// =============================================================================
// CLUSTER C: RPC BOUNDARY
// =============================================================================

/// The only status values RPC callers ever observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcStatus {
    Success,
    Blocked,
    Failed,
}

impl RpcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcStatus::Success => "success",
            RpcStatus::Blocked => "blocked",
            RpcStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AdmitOutcome> for RpcStatus {
    fn from(outcome: AdmitOutcome) -> Self {
        match outcome {
            AdmitOutcome::Accepted => RpcStatus::Success,
            AdmitOutcome::Blocked => RpcStatus::Blocked,
        }
    }
}
