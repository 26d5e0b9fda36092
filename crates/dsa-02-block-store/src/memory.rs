//! In-process block store.

use crate::error::StoreError;
use crate::ports::BlockStore;
use async_trait::async_trait;
use dashmap::DashMap;
use shared_types::{BlockState, FlagLookup};
use tracing::debug;

/// Block flags held in a concurrent map. Selected by `memory://`.
#[derive(Debug, Default)]
pub struct InMemoryBlockStore {
    flags: DashMap<String, BlockState>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored flags.
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Drop every flag, as a manual reset of the store would.
    pub fn clear(&self) {
        let cleared = self.flags.len();
        self.flags.clear();
        debug!(cleared, "[dsa-02] Block store cleared");
    }
}

#[async_trait]
impl BlockStore for InMemoryBlockStore {
    async fn get(&self, source_address: &str) -> Result<FlagLookup, StoreError> {
        Ok(self
            .flags
            .get(source_address)
            .map_or(FlagLookup::Absent, |state| FlagLookup::from(*state)))
    }

    async fn set_blocked(&self, source_address: &str) -> Result<(), StoreError> {
        let previous = self
            .flags
            .insert(source_address.to_string(), BlockState::Blocked);
        debug!(
            source = %source_address,
            already_blocked = previous == Some(BlockState::Blocked),
            "[dsa-02] Flag set"
        );
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
