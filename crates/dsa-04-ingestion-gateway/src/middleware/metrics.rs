//! In-process gateway counters.
//!
//! Mirrors the Prometheus series in `dsa-telemetry` so `/health` and tests
//! can read them without scraping.

use serde::Serialize;
use shared_types::AdmitOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct GatewayMetrics {
    pub requests_total: AtomicU64,
    pub requests_error: AtomicU64,

    pub admitted: AtomicU64,
    pub blocked: AtomicU64,
    pub rejected: AtomicU64,
    pub failed: AtomicU64,
    /// Admissions that went through because the store could not answer
    pub fail_open_admits: AtomicU64,

    pub block_commands: AtomicU64,
    pub block_failures: AtomicU64,

    pub store_errors: AtomicU64,
    pub publish_errors: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one JSON-RPC call (protocol errors count as errors).
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_admission(&self, outcome: AdmitOutcome) {
        match outcome {
            AdmitOutcome::Accepted => self.admitted.fetch_add(1, Ordering::Relaxed),
            AdmitOutcome::Blocked => self.blocked.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_error: self.requests_error.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            fail_open_admits: self.fail_open_admits.load(Ordering::Relaxed),
            block_commands: self.block_commands.load(Ordering::Relaxed),
            block_failures: self.block_failures.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_error: u64,
    pub admitted: u64,
    pub blocked: u64,
    pub rejected: u64,
    pub failed: u64,
    pub fail_open_admits: u64,
    pub block_commands: u64,
    pub block_failures: u64,
    pub store_errors: u64,
    pub publish_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request() {
        let metrics = GatewayMetrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_admission(AdmitOutcome::Blocked);

        let snap = metrics.snapshot();
        assert_eq!(snap.requests_total, 2);
        assert_eq!(snap.requests_error, 1);
        assert_eq!(snap.blocked, 1);
        assert_eq!(snap.admitted, 0);
    }
}
