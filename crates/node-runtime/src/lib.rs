//! # Node Runtime Library
//!
//! Wiring for one DNS stream analyzer node. The `dsa-node` binary is a thin
//! shell over [`NodeRuntime`].
//!
//! ## Feedback Loop
//!
//! ```text
//!   client ──Admit──→ Gateway(dsa-04) ──get──→ Block Store(dsa-02)
//!                        │   ↑
//!                publish │   └──────────── Block ◄──┐
//!                        ↓                          │
//!                  Event Log(dsa-01) ──poll──→ Detector(dsa-03)
//!                        │
//!                        └──DeliveryReport──→ Acknowledger(dsa-05)
//! ```
//!
//! ## Modules
//!
//! - `container/` - Configuration and validation
//! - `adapters/` - In-process port implementations
//! - `cli` - Flags and `DSA_*` environment overrides
//! - `runtime` - Startup and shutdown ordering

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod cli;
pub mod container;
pub mod runtime;

pub use cli::Cli;
pub use container::{ConfigError, NodeConfig};
pub use runtime::{NodeRuntime, RuntimeError, ShutdownReport};
