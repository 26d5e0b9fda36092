//! Gateway domain: configuration, errors and the blocked-source cache.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::BlockedCache;
pub use config::{CircuitBreakerConfig, ConfigError, FallbackPolicy, GatewayConfig, PublishConfig};
pub use error::{codes, ApiError, GatewayError, IngestError};
