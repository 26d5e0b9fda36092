//! # Shared Types Crate
//!
//! This crate contains the domain entities exchanged between the ingestion
//! gateway, the event log, the block store and the detector.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the `RequestRecord` and its payload codec
//!   are defined once and used by both the producer and the consumer side.
//! - **Immutable Records**: a record is validated once at admission and never
//!   mutated afterwards.
//! - **Monotonic Flags**: `BlockState` only ever moves `Clear -> Blocked`;
//!   no type in this crate models the reverse transition.
//! - **Classified Errors**: every error in the workspace maps onto one
//!   `ErrorClass` so callers decide retry/reject/exit uniformly.

pub mod codec;
pub mod entities;
pub mod errors;

pub use codec::{decode_record, encode_record, CodecError, PayloadFormat};
pub use entities::*;
pub use errors::*;
