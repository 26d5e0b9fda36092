//! Consumer group member for the in-memory log.

use super::{Lifecycle, TopicState};
use crate::entry::LogEntry;
use crate::error::LogError;
use crate::ports::LogConsumer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// One member of a consumer group.
///
/// The assignment is refreshed lazily on `poll` whenever the group
/// generation moved. Dropping the consumer leaves the group.
///
/// Between a rebalance and the previous owner's next `poll`, an entry that
/// owner already holds can also be handed to the new owner, so both process
/// it once. The previous owner's `commit` for a revoked partition is
/// ignored, and its next `poll` drops the partition. Consumers must
/// therefore tolerate a duplicate around every join or leave.
pub struct MemoryConsumer {
    topic: Arc<TopicState>,
    group: String,
    member_id: u64,
    generation: u64,
    assigned: Vec<u32>,
    /// Next offset to hand out, per owned partition.
    positions: HashMap<u32, u64>,
    /// Round-robin start for the next poll.
    cursor: usize,
    lifecycle: Arc<Lifecycle>,
}

impl MemoryConsumer {
    pub(crate) fn join(
        topic: Arc<TopicState>,
        group: &str,
        member_id: u64,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        let generation = {
            let mut groups = topic.groups.lock();
            groups.entry(group.to_string()).or_default().join(member_id)
        };
        topic.changed.notify_waiters();
        info!(
            topic = %topic.name(),
            group,
            member_id,
            generation,
            "[dsa-01] Consumer joined group"
        );

        let mut consumer = Self {
            topic,
            group: group.to_string(),
            member_id,
            generation: 0,
            assigned: Vec::new(),
            positions: HashMap::new(),
            cursor: 0,
            lifecycle,
        };
        consumer.refresh_assignment();
        consumer
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Re-read the assignment if the group generation changed.
    fn refresh_assignment(&mut self) {
        let groups = self.topic.groups.lock();
        let Some(state) = groups.get(&self.group) else {
            return;
        };
        if state.generation() == self.generation {
            return;
        }

        let assigned = state.assignment_for(self.member_id, self.topic.partition_count());
        let mut positions = HashMap::with_capacity(assigned.len());
        for partition in &assigned {
            let committed = state.committed(*partition).unwrap_or(0);
            // A partition we kept continues from where we were, unless
            // another member committed further in between.
            let position = match self.positions.get(partition) {
                Some(local) => (*local).max(committed),
                None => committed,
            };
            positions.insert(*partition, position);
        }

        debug!(
            topic = %self.topic.name(),
            group = %self.group,
            member_id = self.member_id,
            generation = state.generation(),
            assigned = ?assigned,
            "[dsa-01] Partition assignment updated"
        );
        self.generation = state.generation();
        self.assigned = assigned;
        self.positions = positions;
        self.cursor = 0;
    }

    /// Next unread entry across owned partitions, rotating the start
    /// partition between calls.
    fn next_ready(&mut self) -> Option<LogEntry> {
        let owned = self.assigned.len();
        for step in 0..owned {
            let index = (self.cursor + step) % owned;
            let partition = self.assigned[index];
            let position = self.positions.get(&partition).copied().unwrap_or(0);

            let record = {
                let log = self.topic.partitions[partition as usize].read();
                log.get(position as usize).cloned()
            };
            if let Some(record) = record {
                self.positions.insert(partition, position + 1);
                self.cursor = (index + 1) % owned;
                return Some(LogEntry {
                    topic: self.topic.name().to_string(),
                    partition,
                    offset: position,
                    key: record.key,
                    payload: record.payload,
                });
            }
        }
        None
    }
}

#[async_trait]
impl LogConsumer for MemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<LogEntry>, LogError> {
        let deadline = Instant::now() + timeout;
        let topic = Arc::clone(&self.topic);
        loop {
            if self.lifecycle.is_closed() {
                return Err(LogError::Closed);
            }

            // Register for wake-ups before checking, so an append between
            // the check and the wait is not missed.
            let changed = topic.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            self.refresh_assignment();
            if let Some(entry) = self.next_ready() {
                return Ok(Some(entry));
            }

            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return Ok(None);
            }
        }
    }

    fn commit(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        if entry.topic != self.topic.name() {
            return Err(LogError::UnknownTopic(entry.topic.clone()));
        }
        let mut groups = self.topic.groups.lock();
        let Some(state) = groups.get_mut(&self.group) else {
            return Ok(());
        };
        if state.owner_of(entry.partition) != Some(self.member_id) {
            debug!(
                group = %self.group,
                member_id = self.member_id,
                partition = entry.partition,
                offset = entry.offset,
                "[dsa-01] Commit ignored, partition no longer owned"
            );
            return Ok(());
        }
        state.commit(entry.partition, entry.offset + 1);
        Ok(())
    }

    fn rewind(&mut self, entry: &LogEntry) {
        if let Some(position) = self.positions.get_mut(&entry.partition) {
            *position = (*position).min(entry.offset);
        }
    }

    fn assignment(&self) -> Vec<u32> {
        self.assigned.clone()
    }

    fn member_id(&self) -> u64 {
        self.member_id
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        let generation = {
            let mut groups = self.topic.groups.lock();
            groups
                .get_mut(&self.group)
                .map(|state| state.leave(self.member_id))
        };
        self.topic.changed.notify_waiters();
        debug!(
            group = %self.group,
            member_id = self.member_id,
            generation = ?generation,
            "[dsa-01] Consumer left group"
        );
    }
}
