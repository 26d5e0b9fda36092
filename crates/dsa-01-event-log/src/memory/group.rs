//! Consumer group membership and partition assignment.

use std::collections::{BTreeSet, HashMap};

/// Shared state of one consumer group on one topic.
#[derive(Debug, Default)]
pub(crate) struct GroupState {
    members: BTreeSet<u64>,
    /// Bumped on every join and leave.
    generation: u64,
    /// Next offset to read, per partition.
    committed: HashMap<u32, u64>,
}

impl GroupState {
    pub(crate) fn join(&mut self, member: u64) -> u64 {
        self.members.insert(member);
        self.generation += 1;
        self.generation
    }

    pub(crate) fn leave(&mut self, member: u64) -> u64 {
        if self.members.remove(&member) {
            self.generation += 1;
        }
        self.generation
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Round-robin owner: partition `p` goes to the `p % n`-th member in id order.
    pub(crate) fn owner_of(&self, partition: u32) -> Option<u64> {
        if self.members.is_empty() {
            return None;
        }
        let index = partition as usize % self.members.len();
        self.members.iter().nth(index).copied()
    }

    pub(crate) fn assignment_for(&self, member: u64, partitions: u32) -> Vec<u32> {
        (0..partitions)
            .filter(|p| self.owner_of(*p) == Some(member))
            .collect()
    }

    pub(crate) fn committed(&self, partition: u32) -> Option<u64> {
        self.committed.get(&partition).copied()
    }

    /// Store `next_offset` unless an equal or later offset is already committed.
    pub(crate) fn commit(&mut self, partition: u32, next_offset: u64) {
        let slot = self.committed.entry(partition).or_insert(0);
        *slot = (*slot).max(next_offset);
    }
}
