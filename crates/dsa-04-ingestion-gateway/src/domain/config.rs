//! Gateway configuration with validation.

use shared_types::PayloadFormat;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Default JSON-RPC port.
pub const DEFAULT_PORT: u16 = 50051;

/// Main gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Where admitted records go
    pub publish: PublishConfig,
    /// Admission policy when the block store cannot answer
    pub store_fallback: FallbackPolicy,
    /// Bound on a single block store call
    pub store_op_timeout: Duration,
    /// Remember positive lookups locally
    pub cache_blocked: bool,
    /// Deadline applied when the caller sends none
    pub request_timeout: Duration,
    /// Upper bound on a caller-supplied deadline
    pub max_request_timeout: Duration,
    pub max_body_bytes: usize,
    /// Maximum JSON-RPC batch length
    pub max_batch_size: usize,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            publish: PublishConfig::default(),
            store_fallback: FallbackPolicy::FailOpen,
            store_op_timeout: Duration::from_millis(200),
            cache_blocked: true,
            request_timeout: Duration::from_secs(5),
            max_request_timeout: Duration::from_secs(30),
            max_body_bytes: 64 * 1024,
            max_batch_size: 100,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("publish topic cannot be empty".into()));
        }
        if self.store_op_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("store_op_timeout cannot be 0".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("request_timeout cannot be 0".into()));
        }
        if self.max_request_timeout < self.request_timeout {
            return Err(ConfigError::InvalidTimeout(
                "max_request_timeout cannot be smaller than request_timeout".into(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit("max_body_bytes cannot be 0".into()));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidLimit("max_batch_size cannot be 0".into()));
        }
        if self.circuit_breaker.enabled {
            if self.circuit_breaker.failure_threshold == 0 {
                return Err(ConfigError::Invalid(
                    "circuit breaker failure_threshold cannot be 0".into(),
                ));
            }
            if self.circuit_breaker.success_threshold == 0 {
                return Err(ConfigError::Invalid(
                    "circuit breaker success_threshold cannot be 0".into(),
                ));
            }
        }
        Ok(())
    }

    /// Get HTTP server bind address
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Deadline for one request given the caller's hint.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(d) if !d.is_zero() => d.min(self.max_request_timeout),
            _ => self.request_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub topic: String,
    /// Key records by source address so one source stays on one partition.
    pub key_by_source: bool,
    pub payload_format: PayloadFormat,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            topic: "dns-requests".to_string(),
            key_by_source: true,
            payload_format: PayloadFormat::Json,
        }
    }
}

/// What `Admit` does when the block flag cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Treat the source as clear and publish.
    #[default]
    FailOpen,
    /// Reject the request with a transient failure.
    FailClosed,
}

impl FromStr for FallbackPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_open" | "open" => Ok(FallbackPolicy::FailOpen),
            "fail_closed" | "closed" => Ok(FallbackPolicy::FailClosed),
            other => Err(ConfigError::Invalid(format!("unknown store fallback: {other}"))),
        }
    }
}

impl std::fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackPolicy::FailOpen => f.write_str("fail_open"),
            FallbackPolicy::FailClosed => f.write_str("fail_closed"),
        }
    }
}

/// Circuit breaker around block store calls.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Successful probes in half-open state before closing
    pub success_threshold: u32,
    /// Duration before half-open from open state
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
