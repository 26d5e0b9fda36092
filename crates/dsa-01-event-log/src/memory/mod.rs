//! # In-Memory Event Log
//!
//! Single-node backend selected by the `memory://` bootstrap address.
//!
//! Publishing goes through a bounded producer queue drained by one broker
//! task, which appends to the partition and emits the delivery report. Each
//! partition is an append-only vector; offsets are vector indices.

mod consumer;
mod group;

pub use consumer::MemoryConsumer;

use crate::entry::{AckHandle, DeliveryOutcome, DeliveryReport, DeliveryReports};
use crate::error::LogError;
use crate::partitioner::Partitioner;
use crate::ports::{EventLog, LogConsumer};
use crate::topic::{TopicMetadata, TopicSpec};
use crate::DEFAULT_PRODUCER_QUEUE_CAPACITY;
use async_trait::async_trait;
use group::GroupState;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, warn};

/// Default time `publish` waits for producer queue space.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_millis(500);

/// In-memory log tuning.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Records buffered between `publish` and the broker task.
    pub producer_queue_capacity: usize,
    /// Upper bound on how long `publish` waits for queue space.
    pub publish_timeout: Duration,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            producer_queue_capacity: DEFAULT_PRODUCER_QUEUE_CAPACITY,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoredRecord {
    pub(crate) key: Option<String>,
    pub(crate) payload: Vec<u8>,
}

/// Partitions and groups of one topic.
pub(crate) struct TopicState {
    pub(crate) metadata: TopicMetadata,
    pub(crate) partitions: Vec<RwLock<Vec<StoredRecord>>>,
    /// Woken on append and on group membership change.
    pub(crate) changed: Notify,
    pub(crate) groups: Mutex<HashMap<String, GroupState>>,
    partitioner: Partitioner,
}

impl TopicState {
    fn new(spec: &TopicSpec) -> Self {
        Self {
            metadata: TopicMetadata {
                name: spec.name.clone(),
                partitions: spec.partitions,
                replication_factor: spec.replication_factor,
                created: false,
            },
            partitions: (0..spec.partitions).map(|_| RwLock::new(Vec::new())).collect(),
            changed: Notify::new(),
            groups: Mutex::new(HashMap::new()),
            partitioner: Partitioner::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.metadata.name
    }

    pub(crate) fn partition_count(&self) -> u32 {
        self.metadata.partitions
    }
}

struct ProduceRequest {
    topic: Arc<TopicState>,
    partition: u32,
    key: Option<String>,
    payload: Vec<u8>,
    ack: oneshot::Sender<DeliveryReport>,
}

/// Flags shared by the log, the broker task and every consumer.
#[derive(Default)]
pub(crate) struct Lifecycle {
    closed: AtomicBool,
    shutdown: Notify,
}

impl Lifecycle {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// In-process event log.
pub struct InMemoryEventLog {
    topics: RwLock<HashMap<String, Arc<TopicState>>>,
    producer: mpsc::Sender<ProduceRequest>,
    lifecycle: Arc<Lifecycle>,
    config: LogConfig,
    next_member: AtomicU64,
    published: Arc<AtomicU64>,
}

impl InMemoryEventLog {
    /// Start the log and its broker task.
    ///
    /// Must be called inside a tokio runtime. The returned `DeliveryReports`
    /// yields one report per accepted publish and ends after `shutdown`.
    pub fn start(config: LogConfig) -> (Arc<Self>, DeliveryReports) {
        let (producer, queue) = mpsc::channel(config.producer_queue_capacity.max(1));
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let lifecycle = Arc::new(Lifecycle::default());
        let published = Arc::new(AtomicU64::new(0));

        tokio::spawn(run_broker(
            queue,
            report_tx,
            Arc::clone(&lifecycle),
            Arc::clone(&published),
        ));

        info!(
            capacity = config.producer_queue_capacity,
            publish_timeout_ms = config.publish_timeout.as_millis() as u64,
            "[dsa-01] In-memory event log started"
        );

        let log = Arc::new(Self {
            topics: RwLock::new(HashMap::new()),
            producer,
            lifecycle,
            config,
            next_member: AtomicU64::new(1),
            published,
        });
        (log, DeliveryReports::new(report_rx))
    }

    /// Stop accepting publishes.
    ///
    /// Records already queued are flushed to their partitions and reported
    /// `Delivered`. A publish that slips its record in after the flush is
    /// reported `Failed`. Pending polls wake up and return `Closed`.
    pub fn shutdown(&self) {
        if self.lifecycle.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.lifecycle.shutdown.notify_one();
        for topic in self.topics.read().values() {
            topic.changed.notify_waiters();
        }
        info!("[dsa-01] Event log shutting down");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Records appended since start.
    #[must_use]
    pub fn records_appended(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Number of entries in a partition (its next offset).
    pub fn end_offset(&self, topic: &str, partition: u32) -> Result<u64, LogError> {
        let state = self.topic(topic)?;
        state
            .partitions
            .get(partition as usize)
            .map(|p| p.read().len() as u64)
            .ok_or_else(|| LogError::UnknownTopic(format!("{topic}[{partition}]")))
    }

    /// Offset the group resumes from, if it committed anything.
    pub fn committed_offset(
        &self,
        topic: &str,
        group: &str,
        partition: u32,
    ) -> Result<Option<u64>, LogError> {
        let state = self.topic(topic)?;
        let groups = state.groups.lock();
        Ok(groups.get(group).and_then(|g| g.committed(partition)))
    }

    /// Current members of a group.
    pub fn group_size(&self, topic: &str, group: &str) -> Result<usize, LogError> {
        let state = self.topic(topic)?;
        let groups = state.groups.lock();
        Ok(groups.get(group).map_or(0, GroupState::member_count))
    }

    fn topic(&self, name: &str) -> Result<Arc<TopicState>, LogError> {
        self.topics
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LogError::UnknownTopic(name.to_string()))
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn ensure_topic(&self, spec: &TopicSpec) -> Result<TopicMetadata, LogError> {
        spec.validate()?;
        let mut topics = self.topics.write();
        if let Some(existing) = topics.get(&spec.name) {
            if existing.metadata.partitions != spec.partitions {
                warn!(
                    topic = %spec.name,
                    existing = existing.metadata.partitions,
                    requested = spec.partitions,
                    "[dsa-01] Topic exists with a different partition count, keeping existing layout"
                );
            }
            return Ok(existing.metadata.clone());
        }

        let state = Arc::new(TopicState::new(spec));
        let mut metadata = state.metadata.clone();
        metadata.created = true;
        topics.insert(spec.name.clone(), state);

        if spec.replication_factor > 1 {
            debug!(
                topic = %spec.name,
                replication_factor = spec.replication_factor,
                "[dsa-01] Replication factor recorded, single copy kept in memory"
            );
        }
        info!(
            topic = %spec.name,
            partitions = spec.partitions,
            "[dsa-01] Topic created"
        );
        Ok(metadata)
    }

    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<AckHandle, LogError> {
        if self.is_closed() {
            return Err(LogError::Closed);
        }
        let state = self.topic(topic)?;
        let partition = state.partitioner.select(key, state.partition_count());

        // Reserving is the only await point; once the permit is held the
        // send below is synchronous, so cancellation cannot split the record.
        let permit = match tokio::time::timeout(self.config.publish_timeout, self.producer.reserve())
            .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(LogError::Closed),
            Err(_) => {
                warn!(
                    topic,
                    timeout_ms = self.config.publish_timeout.as_millis() as u64,
                    "[dsa-01] Producer queue full"
                );
                return Err(LogError::QueueFull(self.config.publish_timeout));
            }
        };

        let (ack, receiver) = oneshot::channel();
        let key = key.map(str::to_string);
        permit.send(ProduceRequest {
            topic: state,
            partition,
            key: key.clone(),
            payload,
            ack,
        });
        Ok(AckHandle::new(topic.to_string(), key, partition, receiver))
    }

    async fn subscribe(&self, topic: &str, group: &str) -> Result<Box<dyn LogConsumer>, LogError> {
        if group.trim().is_empty() || group.chars().any(char::is_whitespace) {
            return Err(LogError::InvalidGroup(group.to_string()));
        }
        if self.is_closed() {
            return Err(LogError::Closed);
        }
        let state = self.topic(topic)?;
        let member_id = self.next_member.fetch_add(1, Ordering::Relaxed);
        let consumer = MemoryConsumer::join(state, group, member_id, Arc::clone(&self.lifecycle));
        Ok(Box::new(consumer))
    }
}

async fn run_broker(
    mut queue: mpsc::Receiver<ProduceRequest>,
    reports: mpsc::UnboundedSender<DeliveryReport>,
    lifecycle: Arc<Lifecycle>,
    appended: Arc<AtomicU64>,
) {
    let commit = |request: ProduceRequest| {
        let report = append(request.topic.as_ref(), &request);
        appended.fetch_add(1, Ordering::Relaxed);
        deliver(request.ack, &reports, report);
    };

    loop {
        tokio::select! {
            biased;
            _ = lifecycle.shutdown.notified() => break,
            next = queue.recv() => match next {
                Some(request) => commit(request),
                None => break,
            },
        }
    }

    // Queued records were already answered as accepted.
    let mut flushed = 0u64;
    while let Ok(request) = queue.try_recv() {
        commit(request);
        flushed += 1;
    }

    queue.close();
    let mut failed = 0u64;
    while let Some(request) = queue.recv().await {
        failed += 1;
        let report = DeliveryReport {
            topic: request.topic.name().to_string(),
            key: request.key,
            outcome: DeliveryOutcome::Failed {
                partition: request.partition,
                reason: "event log shut down".into(),
            },
        };
        deliver(request.ack, &reports, report);
    }
    info!(flushed, failed, "[dsa-01] Broker stopped");
}

fn append(topic: &TopicState, request: &ProduceRequest) -> DeliveryReport {
    let offset = {
        let mut partition = topic.partitions[request.partition as usize].write();
        partition.push(StoredRecord {
            key: request.key.clone(),
            payload: request.payload.clone(),
        });
        (partition.len() - 1) as u64
    };
    topic.changed.notify_waiters();
    DeliveryReport {
        topic: topic.name().to_string(),
        key: request.key.clone(),
        outcome: DeliveryOutcome::Delivered {
            partition: request.partition,
            offset,
        },
    }
}

fn deliver(
    ack: oneshot::Sender<DeliveryReport>,
    reports: &mpsc::UnboundedSender<DeliveryReport>,
    report: DeliveryReport,
) {
    // Nobody listening on either side is fine.
    let _ = reports.send(report.clone());
    let _ = ack.send(report);
}
