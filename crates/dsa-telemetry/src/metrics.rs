//! Prometheus metrics for the ingestion loop.
//!
//! All metrics follow the naming convention: `dsa_<component>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // GATEWAY METRICS
    // =========================================================================

    /// Admission results
    pub static ref ADMISSIONS: CounterVec = CounterVec::new(
        Opts::new("dsa_gateway_admissions_total", "Admit calls by outcome"),
        &["outcome"]  // accepted/blocked/rejected/failed
    ).expect("metric creation failed");

    /// Block commands received by the gateway
    pub static ref BLOCK_COMMANDS: CounterVec = CounterVec::new(
        Opts::new("dsa_gateway_block_commands_total", "Block calls by outcome"),
        &["outcome"]  // success/rejected/failed
    ).expect("metric creation failed");

    /// Admit latency
    pub static ref ADMIT_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "dsa_gateway_admit_duration_seconds",
            "Time spent in Admit, store lookup and publish included"
        ).buckets(exponential_buckets(0.0001, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    /// JSON-RPC requests
    pub static ref RPC_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("dsa_rpc_requests_total", "JSON-RPC requests by method and status"),
        &["method", "status"]
    ).expect("metric creation failed");

    // =========================================================================
    // DEPENDENCY METRICS
    // =========================================================================

    /// Block store failures seen by the gateway
    pub static ref STORE_ERRORS: CounterVec = CounterVec::new(
        Opts::new("dsa_store_errors_total", "Block store errors by operation"),
        &["op"]  // get/set
    ).expect("metric creation failed");

    /// Publish failures seen by the gateway
    pub static ref PUBLISH_ERRORS: CounterVec = CounterVec::new(
        Opts::new("dsa_log_publish_errors_total", "Event log publish errors by reason"),
        &["reason"]  // queue_full/closed/unknown_topic/other
    ).expect("metric creation failed");

    /// Delivery reports drained by the acknowledger
    pub static ref DELIVERY_REPORTS: CounterVec = CounterVec::new(
        Opts::new("dsa_delivery_reports_total", "Delivery reports by outcome"),
        &["outcome"]  // delivered/failed
    ).expect("metric creation failed");

    // =========================================================================
    // DETECTOR METRICS
    // =========================================================================

    /// Records processed by detector replicas
    pub static ref DETECTOR_RECORDS: CounterVec = CounterVec::new(
        Opts::new("dsa_detector_records_total", "Records processed by the detector"),
        &["result"]  // clean/matched/skipped/rewound
    ).expect("metric creation failed");

    /// Block commands issued by the detector
    pub static ref DETECTOR_BLOCK_CALLS: CounterVec = CounterVec::new(
        Opts::new("dsa_detector_block_calls_total", "Block calls issued by the detector"),
        &["outcome"]  // success/retry/failed/suppressed
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Gateway
        Box::new(ADMISSIONS.clone()),
        Box::new(BLOCK_COMMANDS.clone()),
        Box::new(ADMIT_DURATION.clone()),
        Box::new(RPC_REQUESTS.clone()),
        // Dependencies
        Box::new(STORE_ERRORS.clone()),
        Box::new(PUBLISH_ERRORS.clone()),
        Box::new(DELIVERY_REPORTS.clone()),
        // Detector
        Box::new(DETECTOR_RECORDS.clone()),
        Box::new(DETECTOR_BLOCK_CALLS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
