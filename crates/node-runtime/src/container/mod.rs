//! # Node Container
//!
//! Configuration for every component of one node, validated before anything
//! is started.

pub mod config;

pub use config::{ConfigError, DetectorSection, LogSection, NodeConfig};
