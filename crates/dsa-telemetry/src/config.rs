//! Telemetry configuration from environment variables.

use std::env;

/// Logging and metrics settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line.
    pub service_name: String,

    /// Filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` directive such as `dsa_03_detector=debug,info`).
    pub log_level: String,

    /// Whether to emit JSON formatted logs.
    pub json_logs: bool,

    /// Whether to colour console output.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "dns-stream-analyzer".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DSA_SERVICE_NAME`: Service name (default: dns-stream-analyzer)
    /// - `DSA_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `DSA_JSON_LOGS`: JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let json_logs = env::var("DSA_JSON_LOGS")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(is_container);

        Self {
            service_name: env::var("DSA_SERVICE_NAME")
                .unwrap_or_else(|_| "dns-stream-analyzer".to_string()),
            log_level: env::var("DSA_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json_logs,
            ansi: !json_logs,
        }
    }
}
