//! Local cache of sources known to be blocked.
//!
//! Flags only move `clear -> blocked`, so a positive entry never goes stale
//! while the store keeps its data. Negative lookups are never cached.

use dashmap::DashSet;

/// Entries kept before new sources stop being cached.
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

/// Positive-only view of the block store.
///
/// A manual reset of the store is not seen here: a cached source keeps
/// being answered `blocked` until the process restarts. Disable the cache
/// (`cache_blocked = false`) where the store is reset by hand.
#[derive(Debug)]
pub struct BlockedCache {
    enabled: bool,
    capacity: usize,
    sources: DashSet<String>,
}

impl BlockedCache {
    pub fn new(enabled: bool) -> Self {
        Self::with_capacity(enabled, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(enabled: bool, capacity: usize) -> Self {
        Self {
            enabled,
            capacity,
            sources: DashSet::new(),
        }
    }

    pub fn contains(&self, source_address: &str) -> bool {
        self.enabled && self.sources.contains(source_address)
    }

    /// Remember a blocked source. Past capacity the store stays authoritative.
    pub fn insert(&self, source_address: &str) {
        if !self.enabled || self.sources.len() >= self.capacity {
            return;
        }
        self.sources.insert(source_address.to_string());
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
