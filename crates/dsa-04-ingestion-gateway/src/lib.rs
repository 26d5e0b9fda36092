//! # Ingestion Gateway
//!
//! Front door of the pipeline. `Admit` checks the block-list and publishes
//! clear records to the event log; `Block` is the only writer of block flags.
//!
//! ## Admission path
//!
//! ```text
//! validate -> blocked cache -> [circuit breaker] store.get (op timeout)
//!          -> encode -> log.publish (keyed by source) -> accepted
//! ```
//!
//! A store failure applies [`FallbackPolicy`]; a publish failure is a
//! transient `failed`. Blocked sources are never published.
//!
//! ## Transport
//!
//! JSON-RPC 2.0 on `POST /`, with `GET /health` and `GET /metrics`. See
//! [`rpc`] for the methods.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod ingest;
pub mod middleware;
pub mod rpc;
pub mod service;

pub use domain::{
    ApiError, BlockedCache, CircuitBreakerConfig, ConfigError, FallbackPolicy, GatewayConfig,
    GatewayError, IngestError, PublishConfig,
};
pub use ingest::IngestionGateway;
pub use middleware::{CircuitBreaker, CircuitState, GatewayMetrics, MetricsSnapshot};
pub use rpc::{METHOD_ADMIT, METHOD_BLOCK};
pub use service::{bind, GatewayService};
