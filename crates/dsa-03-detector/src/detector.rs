//! The detector loop.
//!
//! ```text
//! poll ──► decode ──► rule ──► Clean ─────────────────────► commit
//!            │          │
//!            └─ error ──┴─► skip (logged) ────────────────► commit
//!                       │
//!                       └─► Malicious ─► memo hit ────────► commit
//!                                     └► Block (retries) ─► ok: commit
//!                                                          └► failed: rewind
//! ```

use crate::config::DetectorConfig;
use crate::error::{DetectorError, SinkError};
use crate::memo::RecentlyBlocked;
use crate::ports::BlockCommandSink;
use crate::rules::{AnomalyRule, Verdict};
use dsa_01_event_log::{LogConsumer, LogEntry, LogError};
use dsa_telemetry::{metric_inc, DETECTOR_BLOCK_CALLS, DETECTOR_RECORDS};
use shared_types::decode_record;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What to do with an entry once processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Done with it; advance the group offset.
    Commit,
    /// Block could not be delivered; read it again.
    Rewind,
}

/// Counters shared by every replica of one detector.
#[derive(Debug, Default)]
pub struct DetectorStats {
    pub processed: AtomicU64,
    pub clean: AtomicU64,
    pub matched: AtomicU64,
    pub skipped: AtomicU64,
    pub blocked: AtomicU64,
    pub suppressed: AtomicU64,
    pub rewound: AtomicU64,
}

impl DetectorStats {
    pub fn snapshot(&self) -> DetectorStatsSnapshot {
        DetectorStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            clean: self.clean.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            rewound: self.rewound.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectorStatsSnapshot {
    pub processed: u64,
    pub clean: u64,
    pub matched: u64,
    pub skipped: u64,
    pub blocked: u64,
    pub suppressed: u64,
    pub rewound: u64,
}

/// Evaluates consumed records and issues Block commands.
///
/// Stateless apart from the memo and counters, so one instance is shared by
/// every replica of a pool.
pub struct Detector {
    rule: Arc<dyn AnomalyRule>,
    sink: Arc<dyn BlockCommandSink>,
    memo: RecentlyBlocked,
    config: DetectorConfig,
    stats: DetectorStats,
}

impl Detector {
    pub fn new(
        config: DetectorConfig,
        rule: Arc<dyn AnomalyRule>,
        sink: Arc<dyn BlockCommandSink>,
    ) -> Result<Self, DetectorError> {
        config.validate()?;
        Ok(Self {
            rule,
            sink,
            memo: RecentlyBlocked::new(config.memo_capacity),
            config,
            stats: DetectorStats::default(),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn stats(&self) -> DetectorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Consume until shutdown is signalled or the log closes.
    pub async fn run(
        &self,
        mut consumer: Box<dyn LogConsumer>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), DetectorError> {
        let member = consumer.member_id();
        info!(
            member,
            topic = %self.config.topic,
            group = %self.config.group,
            rule = self.rule.name(),
            "[dsa-03] Detector replica started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let polled = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                polled = consumer.poll(self.config.poll_timeout) => polled,
            };

            match polled {
                // Empty read; keep going.
                Ok(None) => continue,
                Ok(Some(entry)) => match self.process(&entry).await {
                    Disposition::Commit => {
                        if let Err(e) = consumer.commit(&entry) {
                            warn!(
                                member,
                                partition = entry.partition,
                                offset = entry.offset,
                                error = %e,
                                "[dsa-03] Commit failed"
                            );
                        }
                    }
                    Disposition::Rewind => consumer.rewind(&entry),
                },
                Err(LogError::Closed) => {
                    info!(member, "[dsa-03] Event log closed");
                    break;
                }
                Err(e) => {
                    warn!(member, error = %e, "[dsa-03] Poll failed");
                    tokio::time::sleep(self.config.poll_timeout).await;
                }
            }
        }

        info!(member, "[dsa-03] Detector replica stopped");
        Ok(())
    }

    /// Decode, evaluate and act on one entry.
    pub async fn process(&self, entry: &LogEntry) -> Disposition {
        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        let record = match decode_record(&entry.payload) {
            Ok(record) => record,
            Err(e) => {
                self.skip(entry, &DetectorError::Decode(e));
                return Disposition::Commit;
            }
        };

        let verdict = match self.rule.evaluate(&record) {
            Ok(verdict) => verdict,
            Err(e) => {
                self.skip(entry, &DetectorError::Rule(e));
                return Disposition::Commit;
            }
        };

        let source = record.source_address.as_str();
        match verdict {
            Verdict::Clean => {
                self.stats.clean.fetch_add(1, Ordering::Relaxed);
                metric_inc!(DETECTOR_RECORDS, &["clean"]);
                debug!(source = %source, offset = entry.offset, "[dsa-03] Clean request");
                Disposition::Commit
            }
            Verdict::Malicious { rule, reason } => {
                self.stats.matched.fetch_add(1, Ordering::Relaxed);
                metric_inc!(DETECTOR_RECORDS, &["matched"]);
                info!(
                    source = %source,
                    target = %record.query_target,
                    rule = %rule,
                    reason = %reason,
                    partition = entry.partition,
                    offset = entry.offset,
                    "[dsa-03] Malicious request detected"
                );

                if self.memo.contains(source) {
                    self.stats.suppressed.fetch_add(1, Ordering::Relaxed);
                    metric_inc!(DETECTOR_BLOCK_CALLS, &["suppressed"]);
                    debug!(source = %source, "[dsa-03] Source already blocked, skipping Block call");
                    return Disposition::Commit;
                }

                match self.block_with_retry(source).await {
                    Ok(()) => {
                        self.memo.insert(source);
                        self.stats.blocked.fetch_add(1, Ordering::Relaxed);
                        Disposition::Commit
                    }
                    Err(e) => {
                        self.stats.rewound.fetch_add(1, Ordering::Relaxed);
                        metric_inc!(DETECTOR_RECORDS, &["rewound"]);
                        error!(
                            source = %source,
                            partition = entry.partition,
                            offset = entry.offset,
                            error = %e,
                            "[dsa-03] Block failed, entry will be redelivered"
                        );
                        Disposition::Rewind
                    }
                }
            }
        }
    }

    async fn block_with_retry(&self, source: &str) -> Result<(), DetectorError> {
        let attempts = self.config.block_retries.saturating_add(1);
        let mut last: Option<SinkError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.config.backoff(attempt - 1);
                metric_inc!(DETECTOR_BLOCK_CALLS, &["retry"]);
                debug!(
                    source = %source,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "[dsa-03] Retrying Block"
                );
                tokio::time::sleep(backoff).await;
            }
            match self.sink.block(source).await {
                Ok(()) => {
                    metric_inc!(DETECTOR_BLOCK_CALLS, &["success"]);
                    info!(source = %source, attempt, "[dsa-03] Source blocked");
                    return Ok(());
                }
                Err(e) => {
                    warn!(source = %source, attempt, error = %e, "[dsa-03] Block attempt failed");
                    last = Some(e);
                }
            }
        }

        metric_inc!(DETECTOR_BLOCK_CALLS, &["failed"]);
        Err(DetectorError::Block {
            attempts,
            source: last.unwrap_or_else(|| SinkError::Unavailable("no attempt made".into())),
        })
    }

    fn skip(&self, entry: &LogEntry, err: &DetectorError) {
        self.stats.skipped.fetch_add(1, Ordering::Relaxed);
        metric_inc!(DETECTOR_RECORDS, &["skipped"]);
        warn!(
            partition = entry.partition,
            offset = entry.offset,
            error = %err,
            "[dsa-03] Skipping record"
        );
    }
}
