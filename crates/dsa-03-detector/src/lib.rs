//! # Detector - Asynchronous Anomaly Detection
//!
//! Consumes admitted records from the event log as a member of a consumer
//! group, evaluates each with an [`AnomalyRule`] and sends a Block command
//! to the gateway for every match.
//!
//! ## Delivery
//!
//! At-least-once: an entry is committed only after it was handled. If Block
//! keeps failing the entry is rewound and evaluated again, so `Block` may be
//! called more than once for a source. It is idempotent.
//!
//! ## Ports
//!
//! | Port | Direction | Adapters |
//! |------|-----------|----------|
//! | `LogConsumer` | inbound | in-memory event log |
//! | [`BlockCommandSink`] | outbound | [`HttpGatewayClient`], in-process gateway (node-runtime) |

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod config;
pub mod detector;
pub mod error;
pub mod memo;
pub mod pool;
pub mod ports;
pub mod rules;

pub use adapters::HttpGatewayClient;
pub use config::DetectorConfig;
pub use detector::{Detector, DetectorStatsSnapshot, Disposition};
pub use error::{DetectorError, RuleError, SinkError};
pub use memo::RecentlyBlocked;
pub use pool::DetectorPool;
pub use ports::BlockCommandSink;
pub use rules::{AnomalyRule, AnyRule, SuffixRule, Verdict, DEFAULT_SUFFIX};
