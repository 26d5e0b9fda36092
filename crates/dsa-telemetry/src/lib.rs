//! # DSA Telemetry
//!
//! Logging initialisation and the Prometheus metrics shared by the gateway,
//! the detector and the acknowledger.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dsa_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_telemetry(&config)?;
//! dsa_telemetry::ADMISSIONS.with_label_values(&["accepted"]).inc();
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DSA_SERVICE_NAME` | `dns-stream-analyzer` | Service name in logs |
//! | `DSA_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `DSA_JSON_LOGS` | `false` (`true` in containers) | JSON log output |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, ADMISSIONS, ADMIT_DURATION,
    BLOCK_COMMANDS, DELIVERY_REPORTS, DETECTOR_BLOCK_CALLS, DETECTOR_RECORDS, PUBLISH_ERRORS,
    REGISTRY, RPC_REQUESTS, STORE_ERRORS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}

/// Convenience macro for recording a labelled counter increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
