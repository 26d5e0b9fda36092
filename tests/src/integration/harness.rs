//! Shared fixtures: an in-process pipeline and mock ports.

use async_trait::async_trait;
use dsa_01_event_log::{EventLog, InMemoryEventLog, LogConfig, TopicSpec};
use dsa_02_block_store::{BlockStore, InMemoryBlockStore, StoreError};
use dsa_03_detector::{BlockCommandSink, Detector, DetectorConfig, DetectorPool, SinkError, SuffixRule};
use dsa_04_ingestion_gateway::{GatewayConfig, IngestionGateway};
use dsa_05_delivery_ack::DeliveryAcknowledger;
use node_runtime::adapters::LocalGatewaySink;
use shared_types::{FlagLookup, RequestRecord};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const TOPIC: &str = "dns-requests";
pub const GROUP: &str = "dns-detectors";

/// Log, store and gateway wired the way a node wires them.
pub struct Pipeline {
    pub log: Arc<InMemoryEventLog>,
    pub gateway: Arc<IngestionGateway>,
    pub acknowledger: JoinHandle<dsa_05_delivery_ack::AckStatsSnapshot>,
    _ack_shutdown: watch::Sender<bool>,
}

impl Pipeline {
    pub async fn new(partitions: u32) -> (Self, Arc<InMemoryBlockStore>) {
        let store = Arc::new(InMemoryBlockStore::new());
        let pipeline = Self::with_store(GatewayConfig::default(), store.clone(), partitions).await;
        (pipeline, store)
    }

    pub async fn with_store(
        config: GatewayConfig,
        store: Arc<dyn BlockStore>,
        partitions: u32,
    ) -> Self {
        let (log, reports) = InMemoryEventLog::start(LogConfig::default());
        log.ensure_topic(&TopicSpec::new(TOPIC, partitions, 1))
            .await
            .unwrap();
        let gateway = Arc::new(IngestionGateway::new(config, log.clone(), store));
        let (ack_shutdown, ack_rx) = watch::channel(false);
        let acknowledger = DeliveryAcknowledger::new(reports).spawn(ack_rx);
        Self {
            log,
            gateway,
            acknowledger,
            _ack_shutdown: ack_shutdown,
        }
    }

    /// Records published across all partitions.
    pub fn published(&self) -> u64 {
        self.log.records_appended()
    }

    pub async fn admit(&self, source: &str, t: i64) -> shared_types::AdmitOutcome {
        self.gateway
            .admit(RequestRecord::new(source, "api.mywebsite.com", "A", t))
            .await
            .unwrap()
    }

    /// Detector pool feeding Block commands into this pipeline's gateway.
    pub async fn start_detector(&self, replicas: usize) -> (DetectorPool, Arc<CountingSink>) {
        let local = Arc::new(LocalGatewaySink::new(Arc::clone(&self.gateway)));
        let sink = Arc::new(CountingSink::new(local, 0));
        let pool = self.start_detector_with(sink.clone(), replicas).await;
        (pool, sink)
    }

    pub async fn start_detector_with(
        &self,
        sink: Arc<dyn BlockCommandSink>,
        replicas: usize,
    ) -> DetectorPool {
        let config = DetectorConfig {
            replicas,
            ..detector_config()
        };
        let detector =
            Arc::new(Detector::new(config, Arc::new(SuffixRule::default()), sink).unwrap());
        let log: Arc<dyn EventLog> = self.log.clone();
        DetectorPool::start(log, detector).await.unwrap()
    }
}

/// Fast polling and short backoff for tests.
pub fn detector_config() -> DetectorConfig {
    DetectorConfig {
        topic: TOPIC.into(),
        group: GROUP.into(),
        poll_timeout: Duration::from_millis(20),
        block_retries: 1,
        retry_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        ..DetectorConfig::default()
    }
}

/// Wraps a sink, failing the first `fail_first` calls.
pub struct CountingSink {
    inner: Arc<dyn BlockCommandSink>,
    fail_first: u32,
    calls: AtomicU32,
    delivered: AtomicU32,
}

impl CountingSink {
    pub fn new(inner: Arc<dyn BlockCommandSink>, fail_first: u32) -> Self {
        Self {
            inner,
            fail_first,
            calls: AtomicU32::new(0),
            delivered: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> u32 {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockCommandSink for CountingSink {
    async fn block(&self, source_address: &str) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return Err(SinkError::Unavailable("gateway restarting".into()));
        }
        self.inner.block(source_address).await?;
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A block store that refuses every connection.
pub struct DownStore;

#[async_trait]
impl BlockStore for DownStore {
    async fn get(&self, _source_address: &str) -> Result<FlagLookup, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set_blocked(&self, _source_address: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn backend(&self) -> &'static str {
        "down"
    }
}

/// Poll `check` until it holds, failing the test after five seconds.
pub async fn eventually<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}
