//! # Delivery Acknowledger
//!
//! Drains the event log's delivery reports in the background and records
//! each outcome. It never retries: a failed report means the caller already
//! got `accepted` for a record the log did not keep, and the warning plus
//! the `dsa_delivery_reports_total{outcome="failed"}` counter is the signal.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod acknowledger;

pub use acknowledger::{AckStats, AckStatsSnapshot, DeliveryAcknowledger};
