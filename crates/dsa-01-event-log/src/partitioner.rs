//! Partition selection.
//!
//! Keyed records hash to a fixed partition (FNV-1a, stable across processes);
//! unkeyed records are spread round-robin.

use std::sync::atomic::{AtomicU64, Ordering};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Chooses a partition for each published record.
#[derive(Debug, Default)]
pub struct Partitioner {
    next: AtomicU64,
}

impl Partitioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition for a record. `partitions` must be non-zero.
    pub fn select(&self, key: Option<&str>, partitions: u32) -> u32 {
        debug_assert!(partitions > 0);
        let partitions = partitions.max(1);
        match key {
            Some(key) => fnv1a(key.as_bytes()) % partitions,
            None => (self.next.fetch_add(1, Ordering::Relaxed) % u64::from(partitions)) as u32,
        }
    }
}
