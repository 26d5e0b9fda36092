//! Admit and Block, independent of the RPC transport.

use crate::domain::{BlockedCache, FallbackPolicy, GatewayConfig, IngestError};
use crate::middleware::{CircuitBreaker, GatewayMetrics};
use dsa_01_event_log::{EventLog, LogError};
use dsa_02_block_store::{BlockStore, StoreError};
use dsa_telemetry::{
    metric_inc, HistogramTimer, ADMISSIONS, ADMIT_DURATION, BLOCK_COMMANDS, PUBLISH_ERRORS,
    STORE_ERRORS,
};
use shared_types::{
    encode_record, validate_source_address, AdmitOutcome, Classify, FlagLookup, RequestRecord,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Front door of the pipeline.
///
/// Sole writer to the block store. Shared behind an `Arc` by every RPC
/// handler and by in-process Block callers.
pub struct IngestionGateway {
    config: Arc<GatewayConfig>,
    log: Arc<dyn EventLog>,
    store: Arc<dyn BlockStore>,
    breaker: CircuitBreaker,
    cache: BlockedCache,
    metrics: Arc<GatewayMetrics>,
}

impl IngestionGateway {
    pub fn new(config: GatewayConfig, log: Arc<dyn EventLog>, store: Arc<dyn BlockStore>) -> Self {
        let breaker = CircuitBreaker::new("block-store", config.circuit_breaker.clone());
        let cache = BlockedCache::new(config.cache_blocked);
        Self {
            config: Arc::new(config),
            log,
            store,
            breaker,
            cache,
            metrics: Arc::new(GatewayMetrics::new()),
        }
    }

    pub fn config(&self) -> &Arc<GatewayConfig> {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Decide whether `record` may enter the log, and publish it if so.
    ///
    /// `Accepted` means the log took the write into its producer queue. A
    /// blocked source is answered from the cache or the store and never
    /// published.
    pub async fn admit(&self, record: RequestRecord) -> Result<AdmitOutcome, IngestError> {
        let _timer = HistogramTimer::new(&ADMIT_DURATION);

        if let Err(e) = record.validate() {
            debug!(error = %e, "[dsa-04] Admit rejected malformed record");
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            metric_inc!(ADMISSIONS, &["rejected"]);
            return Err(e.into());
        }
        let source = record.source_address.as_str();

        if self.cache.contains(source) {
            return Ok(self.blocked(source));
        }

        match self.lookup(source).await {
            Ok(lookup) if lookup.is_blocked() => {
                self.cache.insert(source);
                return Ok(self.blocked(source));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    source = %source,
                    error = %e,
                    fallback = %self.config.store_fallback,
                    "[dsa-04] Block store lookup failed"
                );
                self.metrics.store_errors.fetch_add(1, Ordering::Relaxed);
                metric_inc!(STORE_ERRORS, &["get"]);
                match self.config.store_fallback {
                    FallbackPolicy::FailOpen => {
                        self.metrics.fail_open_admits.fetch_add(1, Ordering::Relaxed);
                    }
                    FallbackPolicy::FailClosed => {
                        self.fail_admission();
                        return Err(e);
                    }
                }
            }
        }

        let payload = match encode_record(&record, self.config.publish.payload_format) {
            Ok(payload) => payload,
            Err(e) => {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                metric_inc!(ADMISSIONS, &["rejected"]);
                return Err(e.into());
            }
        };
        let key = self.config.publish.key_by_source.then_some(source);

        match self.log.publish(&self.config.publish.topic, key, payload).await {
            Ok(ack) => {
                debug!(
                    source = %source,
                    topic = %ack.topic(),
                    partition = ack.partition(),
                    "[dsa-04] Record admitted"
                );
                self.metrics.record_admission(AdmitOutcome::Accepted);
                metric_inc!(ADMISSIONS, &["accepted"]);
                Ok(AdmitOutcome::Accepted)
            }
            Err(e) => {
                warn!(source = %source, error = %e, "[dsa-04] Publish failed");
                self.metrics.publish_errors.fetch_add(1, Ordering::Relaxed);
                metric_inc!(PUBLISH_ERRORS, &[publish_error_reason(&e)]);
                self.fail_admission();
                Err(e.into())
            }
        }
    }

    /// Flag `source_address` as blocked. Idempotent.
    pub async fn block(&self, source_address: &str) -> Result<(), IngestError> {
        if let Err(e) = validate_source_address(source_address) {
            metric_inc!(BLOCK_COMMANDS, &["rejected"]);
            self.metrics.block_failures.fetch_add(1, Ordering::Relaxed);
            return Err(e.into());
        }

        match self.bounded_store_call(self.store.set_blocked(source_address)).await {
            Ok(()) => {
                self.cache.insert(source_address);
                self.metrics.block_commands.fetch_add(1, Ordering::Relaxed);
                metric_inc!(BLOCK_COMMANDS, &["success"]);
                info!(source = %source_address, "[dsa-04] Source blocked");
                Ok(())
            }
            Err(e) => {
                warn!(source = %source_address, error = %e, "[dsa-04] Block failed");
                self.metrics.store_errors.fetch_add(1, Ordering::Relaxed);
                self.metrics.block_failures.fetch_add(1, Ordering::Relaxed);
                metric_inc!(STORE_ERRORS, &["set"]);
                metric_inc!(BLOCK_COMMANDS, &["failed"]);
                Err(e)
            }
        }
    }

    async fn lookup(&self, source: &str) -> Result<FlagLookup, IngestError> {
        self.bounded_store_call(self.store.get(source)).await
    }

    /// Run one store call behind the breaker and the op timeout.
    async fn bounded_store_call<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, IngestError> {
        if !self.breaker.should_allow() {
            return Err(IngestError::CircuitOpen);
        }
        let result = match timeout(self.config.store_op_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.config.store_op_timeout)),
        };
        match result {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            Err(e) => {
                if e.class().is_transient() {
                    self.breaker.record_failure();
                }
                Err(e.into())
            }
        }
    }

    fn blocked(&self, source: &str) -> AdmitOutcome {
        debug!(source = %source, "[dsa-04] Admission denied, source blocked");
        self.metrics.record_admission(AdmitOutcome::Blocked);
        metric_inc!(ADMISSIONS, &["blocked"]);
        AdmitOutcome::Blocked
    }

    fn fail_admission(&self) {
        self.metrics.failed.fetch_add(1, Ordering::Relaxed);
        metric_inc!(ADMISSIONS, &["failed"]);
    }
}

fn publish_error_reason(error: &LogError) -> &'static str {
    match error {
        LogError::QueueFull(_) => "queue_full",
        LogError::Closed => "closed",
        LogError::UnknownTopic(_) => "unknown_topic",
        _ => "other",
    }
}
