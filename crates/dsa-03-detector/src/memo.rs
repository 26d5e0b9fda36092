//! Recently-blocked memo.
//!
//! Skips redundant Block calls for sources this replica already got
//! confirmed. Evicts oldest first. Losing an entry only costs one extra
//! idempotent Block call.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

pub const DEFAULT_MEMO_CAPACITY: usize = 4096;

/// Sources whose Block this replica already saw confirmed.
///
/// Entries are only dropped by eviction. If the block store is reset by
/// hand, a remembered source is not re-blocked by this replica until the
/// process restarts or the entry is evicted. Use a capacity of 0 where
/// manual resets are expected.
#[derive(Debug)]
pub struct RecentlyBlocked {
    capacity: usize,
    inner: Mutex<MemoInner>,
}

#[derive(Debug, Default)]
struct MemoInner {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl RecentlyBlocked {
    /// A capacity of 0 disables the memo.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(MemoInner::default()),
        }
    }

    pub fn contains(&self, source_address: &str) -> bool {
        self.inner.lock().members.contains(source_address)
    }

    pub fn insert(&self, source_address: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if !inner.members.insert(source_address.to_string()) {
            return;
        }
        inner.order.push_back(source_address.to_string());
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.members.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecentlyBlocked {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_CAPACITY)
    }
}
