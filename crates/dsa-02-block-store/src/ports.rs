//! Block store port.

use crate::error::StoreError;
use async_trait::async_trait;
use shared_types::FlagLookup;

/// Single-key block flags.
///
/// No operation clears a flag. A blocked source stays blocked until the
/// backing store is reset out of band.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Look up the flag for a source.
    async fn get(&self, source_address: &str) -> Result<FlagLookup, StoreError>;

    /// Set the flag to `blocked`. Idempotent.
    async fn set_blocked(&self, source_address: &str) -> Result<(), StoreError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
