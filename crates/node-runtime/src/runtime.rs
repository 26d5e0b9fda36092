//! # Node Runtime
//!
//! Starts every component of one node and stops them in reverse order.
//!
//! ## Startup Sequence
//!
//! 1. Validate configuration (any failure is an `IrrecoverableStartup`)
//! 2. Start the event log and create the topic
//! 3. Open the block store
//! 4. Bind the gateway listener and start serving
//! 5. Start the delivery acknowledger
//! 6. Start the detector pool (if enabled)
//!
//! ## Shutdown Sequence
//!
//! Gateway first, so no new records arrive. Then the detector pool, then the
//! event log. The acknowledger finishes on its own once the log has reported
//! every queued record.

use crate::adapters::LocalGatewaySink;
use crate::container::{ConfigError, NodeConfig};
use dsa_01_event_log::{EventLog, InMemoryEventLog, LogError};
use dsa_02_block_store::{open_block_store, StoreError};
use dsa_03_detector::{
    AnomalyRule, AnyRule, BlockCommandSink, Detector, DetectorError, DetectorPool,
    DetectorStatsSnapshot, HttpGatewayClient, RuleError, SinkError, SuffixRule,
};
use dsa_04_ingestion_gateway::{bind, GatewayError, GatewayService, IngestionGateway};
use dsa_05_delivery_ack::{AckStats, AckStatsSnapshot, DeliveryAcknowledger};
use shared_types::{Classify, ErrorClass};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long shutdown waits for each stage before moving on.
const STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that stop the node.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("event log: {0}")]
    Log(#[from] LogError),

    #[error("block store: {0}")]
    Store(#[from] StoreError),

    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("detector: {0}")]
    Detector(#[from] DetectorError),

    #[error("anomaly rule: {0}")]
    Rule(#[from] RuleError),

    #[error("block command sink: {0}")]
    Sink(#[from] SinkError),

    #[error("gateway server stopped unexpectedly")]
    ServerStopped,
}

impl Classify for RuntimeError {
    fn class(&self) -> ErrorClass {
        ErrorClass::IrrecoverableStartup
    }
}

/// Final counters, logged on exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownReport {
    pub admitted: u64,
    pub blocked: u64,
    pub delivery: AckStatsSnapshot,
    pub detector: Option<DetectorStatsSnapshot>,
}

/// One running node.
pub struct NodeRuntime {
    log: Arc<InMemoryEventLog>,
    gateway: Arc<IngestionGateway>,
    local_addr: SocketAddr,
    server: Option<JoinHandle<Result<(), GatewayError>>>,
    server_shutdown: watch::Sender<bool>,
    detectors: Option<DetectorPool>,
    acknowledger: JoinHandle<AckStatsSnapshot>,
    ack_shutdown: watch::Sender<bool>,
    ack_stats: Arc<AckStats>,
}

impl NodeRuntime {
    /// Validate `config` and start every component.
    ///
    /// Nothing is left running if this fails.
    pub async fn start(config: NodeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        info!("===========================================");
        info!("  DNS Stream Analyzer node");
        info!("===========================================");

        // Step 1: event log and topic
        let (log, reports) = InMemoryEventLog::start(config.log.log_config());
        let topic = match log.ensure_topic(&config.log.topic_spec()).await {
            Ok(topic) => topic,
            Err(e) => {
                log.shutdown();
                return Err(e.into());
            }
        };
        info!(
            topic = %topic.name,
            partitions = topic.partitions,
            replication_factor = topic.replication_factor,
            "[node] Topic ready"
        );

        // Step 2: block store
        let store = match open_block_store(&config.store) {
            Ok(store) => store,
            Err(e) => {
                log.shutdown();
                return Err(e.into());
            }
        };

        // Step 3: gateway
        let log_port: Arc<dyn EventLog> = log.clone();
        let gateway = Arc::new(IngestionGateway::new(
            config.gateway_config(),
            Arc::clone(&log_port),
            store,
        ));
        let listener = match bind(gateway.config().listen_addr()).await {
            Ok(listener) => listener,
            Err(e) => {
                log.shutdown();
                return Err(e.into());
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Serve(e.to_string()))?;

        let (server_shutdown, server_rx) = watch::channel(false);
        let service = GatewayService::new(Arc::clone(&gateway));
        let server = tokio::spawn(service.serve(listener, wait_for_stop(server_rx)));

        // Step 4: acknowledger
        let (ack_shutdown, ack_rx) = watch::channel(false);
        let acknowledger = DeliveryAcknowledger::new(reports);
        let ack_stats = acknowledger.stats();
        let acknowledger = acknowledger.spawn(ack_rx);

        let mut runtime = Self {
            log,
            gateway,
            local_addr,
            server: Some(server),
            server_shutdown,
            detectors: None,
            acknowledger,
            ack_shutdown,
            ack_stats,
        };

        // Step 5: detector replicas
        if config.detector.enabled {
            match runtime.start_detectors(&config, log_port).await {
                Ok(pool) => runtime.detectors = Some(pool),
                Err(e) => {
                    runtime.shutdown().await;
                    return Err(e);
                }
            }
        } else {
            info!("[node] Detector disabled in this node");
        }

        info!(
            rpc = %runtime.local_addr,
            store = runtime.gateway.store_backend(),
            fallback = %runtime.gateway.config().store_fallback,
            "[node] All components running"
        );
        Ok(runtime)
    }

    async fn start_detectors(
        &self,
        config: &NodeConfig,
        log: Arc<dyn EventLog>,
    ) -> Result<DetectorPool, RuntimeError> {
        let rule = build_rule(&config.detector.rule_suffixes)?;
        let sink: Arc<dyn BlockCommandSink> = match &config.detector.gateway_url {
            Some(url) => {
                info!(url = %url, "[node] Detector sends Block over HTTP");
                Arc::new(HttpGatewayClient::new(url.clone(), config.detector.block_timeout)?)
            }
            None => Arc::new(LocalGatewaySink::new(Arc::clone(&self.gateway))),
        };
        let detector = Arc::new(Detector::new(config.detector_config(), rule, sink)?);
        Ok(DetectorPool::start(log, detector).await?)
    }

    /// Address the gateway is actually listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn gateway(&self) -> &Arc<IngestionGateway> {
        &self.gateway
    }

    pub fn event_log(&self) -> &Arc<InMemoryEventLog> {
        &self.log
    }

    pub fn delivery_stats(&self) -> AckStatsSnapshot {
        self.ack_stats.snapshot()
    }

    pub fn detector_stats(&self) -> Option<DetectorStatsSnapshot> {
        self.detectors.as_ref().map(|pool| pool.detector().stats())
    }

    /// Run until `signal` resolves, then shut down.
    ///
    /// Returns an error if the gateway server stops on its own first.
    pub async fn run_until<F>(mut self, signal: F) -> Result<ShutdownReport, RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let server_result = match self.server.as_mut() {
            Some(server) => tokio::select! {
                _ = signal => None,
                result = server => Some(result),
            },
            None => {
                signal.await;
                None
            }
        };

        let Some(result) = server_result else {
            info!("[node] Shutdown signal received");
            return Ok(self.shutdown().await);
        };

        self.server = None;
        let err = match result {
            Ok(Ok(())) => RuntimeError::ServerStopped,
            Ok(Err(e)) => RuntimeError::Gateway(e),
            Err(e) => RuntimeError::Gateway(GatewayError::Serve(e.to_string())),
        };
        error!(error = %err, "[node] Gateway server exited");
        self.shutdown().await;
        Err(err)
    }

    /// Stop every component, gateway first.
    pub async fn shutdown(mut self) -> ShutdownReport {
        info!("Initiating graceful shutdown...");

        let _ = self.server_shutdown.send(true);
        if let Some(server) = self.server.take() {
            match tokio::time::timeout(STAGE_TIMEOUT, server).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!(error = %e, "[node] Gateway server failed"),
                Ok(Err(e)) => error!(error = %e, "[node] Gateway server task panicked"),
                Err(_) => warn!("[node] Gateway did not stop in time"),
            }
        }

        let detector = match self.detectors.take() {
            Some(pool) => {
                let stats = pool.detector().stats();
                pool.shutdown().await;
                Some(stats)
            }
            None => None,
        };

        self.log.shutdown();

        let delivery = match tokio::time::timeout(STAGE_TIMEOUT, &mut self.acknowledger).await {
            Ok(result) => result.unwrap_or_else(|e| {
                error!(error = %e, "[node] Acknowledger task panicked");
                self.ack_stats.snapshot()
            }),
            Err(_) => {
                warn!("[node] Delivery reports still pending; stopping acknowledger");
                let _ = self.ack_shutdown.send(true);
                match (&mut self.acknowledger).await {
                    Ok(stats) => stats,
                    Err(_) => self.ack_stats.snapshot(),
                }
            }
        };

        let metrics = self.gateway.metrics();
        let report = ShutdownReport {
            admitted: metrics.admitted.load(Ordering::Relaxed),
            blocked: metrics.blocked.load(Ordering::Relaxed),
            delivery,
            detector,
        };
        info!(
            admitted = report.admitted,
            blocked = report.blocked,
            delivered = report.delivery.delivered,
            delivery_failed = report.delivery.failed,
            "Shutdown complete"
        );
        report
    }
}

/// Resolves once `rx` reads `true` or its sender is gone.
async fn wait_for_stop(mut rx: watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// One suffix becomes a [`SuffixRule`]; several are OR-ed with [`AnyRule`].
pub fn build_rule(suffixes: &[String]) -> Result<Arc<dyn AnomalyRule>, RuleError> {
    if let [suffix] = suffixes {
        return Ok(Arc::new(SuffixRule::new(suffix.trim())?));
    }
    let mut rule = AnyRule::new();
    for suffix in suffixes {
        rule = rule.with(SuffixRule::new(suffix.trim())?);
    }
    if rule.is_empty() {
        return Err(RuleError::InvalidParameter("no suffixes configured".into()));
    }
    Ok(Arc::new(rule))
}
