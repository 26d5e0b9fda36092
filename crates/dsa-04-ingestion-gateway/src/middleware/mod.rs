//! Middleware layers for the gateway.

pub mod circuit_breaker;
pub mod metrics;
pub mod timeout;
pub mod tracing;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use self::tracing::{TracingLayer, REQUEST_ID_HEADER};
pub use timeout::{TimeoutLayer, REQUEST_TIMEOUT_HEADER};
