//! Report-draining loop.

use dsa_01_event_log::{DeliveryOutcome, DeliveryReport, DeliveryReports};
use dsa_telemetry::{metric_inc, DELIVERY_REPORTS};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct AckStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl AckStats {
    pub fn snapshot(&self) -> AckStatsSnapshot {
        AckStatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckStatsSnapshot {
    pub delivered: u64,
    pub failed: u64,
}

impl AckStatsSnapshot {
    pub fn total(&self) -> u64 {
        self.delivered + self.failed
    }
}

pub struct DeliveryAcknowledger {
    reports: DeliveryReports,
    stats: Arc<AckStats>,
}

impl DeliveryAcknowledger {
    pub fn new(reports: DeliveryReports) -> Self {
        Self {
            reports,
            stats: Arc::new(AckStats::default()),
        }
    }

    /// Counters that stay readable after the loop is spawned.
    pub fn stats(&self) -> Arc<AckStats> {
        Arc::clone(&self.stats)
    }

    /// Run until the report channel closes or `shutdown` flips to `true`.
    ///
    /// On shutdown, reports already queued are still recorded.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> AckStatsSnapshot {
        info!("[dsa-05] Delivery acknowledger started");

        loop {
            if *shutdown.borrow() {
                self.drain_queued();
                break;
            }
            tokio::select! {
                next = self.reports.recv() => match next {
                    Some(report) => self.record(&report),
                    None => {
                        debug!("[dsa-05] Report channel closed");
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Shutdown sender dropped.
                        self.drain_queued();
                        break;
                    }
                }
            }
        }

        let snapshot = self.stats.snapshot();
        info!(
            delivered = snapshot.delivered,
            failed = snapshot.failed,
            "[dsa-05] Delivery acknowledger stopped"
        );
        snapshot
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<AckStatsSnapshot> {
        tokio::spawn(self.run(shutdown))
    }

    fn drain_queued(&mut self) {
        while let Some(report) = self.reports.try_recv() {
            self.record(&report);
        }
    }

    fn record(&self, report: &DeliveryReport) {
        match &report.outcome {
            DeliveryOutcome::Delivered { partition, offset } => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                metric_inc!(DELIVERY_REPORTS, &["delivered"]);
                debug!(
                    topic = %report.topic,
                    key = report.key.as_deref().unwrap_or(""),
                    partition,
                    offset,
                    "[dsa-05] Delivered"
                );
            }
            DeliveryOutcome::Failed { partition, reason } => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                metric_inc!(DELIVERY_REPORTS, &["failed"]);
                warn!(
                    topic = %report.topic,
                    key = report.key.as_deref().unwrap_or(""),
                    partition,
                    reason = %reason,
                    "[dsa-05] Delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsa_01_event_log::{EventLog, InMemoryEventLog, LogConfig, TopicSpec};
    use std::time::Duration;

    async fn log() -> (Arc<InMemoryEventLog>, DeliveryReports) {
        let (log, reports) = InMemoryEventLog::start(LogConfig::default());
        log.ensure_topic(&TopicSpec::new("dns", 2, 1)).await.unwrap();
        (log, reports)
    }

    #[tokio::test]
    async fn test_counts_every_delivered_record() {
        let (log, reports) = log().await;
        let (_tx, rx) = watch::channel(false);
        let ack = DeliveryAcknowledger::new(reports);
        let stats = ack.stats();
        let handle = ack.spawn(rx);

        let mut handles = Vec::new();
        for i in 0..5 {
            let key = format!("10.0.0.{i}");
            handles.push(log.publish("dns", Some(&key), b"x".to_vec()).await.unwrap());
        }
        for h in handles {
            assert!(h.delivered().await.is_delivered());
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while stats.snapshot().delivered < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        log.shutdown();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot, AckStatsSnapshot { delivered: 5, failed: 0 });
    }

    #[tokio::test]
    async fn test_stops_when_channel_closes() {
        let (log, reports) = log().await;
        let (_tx, rx) = watch::channel(false);
        let handle = DeliveryAcknowledger::new(reports).spawn(rx);

        log.shutdown();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.total(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_reports() {
        let (log, reports) = log().await;
        let mut handles = Vec::new();
        for _ in 0..3 {
            handles.push(log.publish("dns", None, b"x".to_vec()).await.unwrap());
        }
        for h in handles {
            h.delivered().await;
        }

        // Signal before the loop ever runs; queued reports must still count.
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let snapshot = DeliveryAcknowledger::new(reports).run(rx).await;
        assert_eq!(snapshot.delivered, 3);
    }

    #[tokio::test]
    async fn test_failed_reports_are_counted() {
        let (log, reports) = InMemoryEventLog::start(LogConfig {
            producer_queue_capacity: 8,
            ..LogConfig::default()
        });
        log.ensure_topic(&TopicSpec::new("dns", 1, 1)).await.unwrap();
        let (_tx, rx) = watch::channel(false);
        let ack = DeliveryAcknowledger::new(reports);

        let report = DeliveryReport {
            topic: "dns".into(),
            key: None,
            outcome: DeliveryOutcome::Failed {
                partition: 0,
                reason: "event log shut down".into(),
            },
        };
        ack.record(&report);
        assert_eq!(ack.stats().snapshot().failed, 1);

        log.shutdown();
        let snapshot = ack.run(rx).await;
        assert_eq!(snapshot.failed, 1);
    }
}
