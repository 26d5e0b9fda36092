//! Runs several detector replicas in one consumer group.

use crate::detector::Detector;
use crate::error::DetectorError;
use dsa_01_event_log::EventLog;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct DetectorPool {
    detector: Arc<Detector>,
    shutdown: watch::Sender<bool>,
    replicas: Vec<JoinHandle<Result<(), DetectorError>>>,
}

impl DetectorPool {
    /// Join `config.replicas` members to the group and start consuming.
    pub async fn start(log: Arc<dyn EventLog>, detector: Arc<Detector>) -> Result<Self, DetectorError> {
        let config = detector.config().clone();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut replicas = Vec::with_capacity(config.replicas);
        for _ in 0..config.replicas {
            let consumer = log.subscribe(&config.topic, &config.group).await?;
            let replica = Arc::clone(&detector);
            let rx = shutdown_rx.clone();
            replicas.push(tokio::spawn(async move { replica.run(consumer, rx).await }));
        }

        info!(
            replicas = config.replicas,
            topic = %config.topic,
            group = %config.group,
            "[dsa-03] Detector pool started"
        );
        Ok(Self {
            detector,
            shutdown,
            replicas,
        })
    }

    pub fn detector(&self) -> &Arc<Detector> {
        &self.detector
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Signal every replica and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.replicas {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "[dsa-03] Detector replica failed"),
                Err(e) => error!(error = %e, "[dsa-03] Detector replica panicked"),
            }
        }
        info!("[dsa-03] Detector pool stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::error::SinkError;
    use crate::ports::BlockCommandSink;
    use crate::rules::SuffixRule;
    use async_trait::async_trait;
    use dsa_01_event_log::{InMemoryEventLog, LogConfig, TopicSpec};
    use parking_lot::Mutex;
    use shared_types::{encode_record, PayloadFormat, RequestRecord};
    use std::time::Duration;

    #[derive(Default)]
    struct CollectingSink {
        blocked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlockCommandSink for CollectingSink {
        async fn block(&self, source_address: &str) -> Result<(), SinkError> {
            self.blocked.lock().push(source_address.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pool_blocks_matching_sources_across_partitions() {
        let (log, _reports) = InMemoryEventLog::start(LogConfig::default());
        log.ensure_topic(&TopicSpec::new("dns", 4, 1)).await.unwrap();

        let sink = Arc::new(CollectingSink::default());
        let config = DetectorConfig {
            topic: "dns".into(),
            group: "detectors".into(),
            replicas: 2,
            poll_timeout: Duration::from_millis(20),
            ..DetectorConfig::default()
        };
        let detector = Arc::new(
            Detector::new(config, Arc::new(SuffixRule::default()), sink.clone()).unwrap(),
        );
        let pool = DetectorPool::start(log.clone(), detector).await.unwrap();
        assert_eq!(pool.replica_count(), 2);

        for source in ["10.0.0.70", "10.0.0.71", "10.0.1.70", "10.0.0.72"] {
            let record = RequestRecord::new(source, "a.com", "A", 1);
            let payload = encode_record(&record, PayloadFormat::Json).unwrap();
            log.publish("dns", Some(source), payload).await.unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if sink.blocked.lock().len() >= 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        pool.shutdown().await;
        let mut blocked = sink.blocked.lock().clone();
        blocked.sort();
        assert_eq!(blocked, vec!["10.0.0.70".to_string(), "10.0.1.70".to_string()]);
        assert_eq!(log.group_size("dns", "detectors").unwrap(), 0);
    }
}
