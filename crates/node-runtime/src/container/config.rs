//! # Node Configuration
//!
//! One configuration object for every component, read once at startup.
//!
//! The `log` section owns the topic layout; the gateway and detector configs
//! handed to the components are derived from it so producer and consumer can
//! never disagree on the topic.

use dsa_01_event_log::{LogBackend, LogConfig, LogError, TopicSpec, MEMORY_BOOTSTRAP};
use dsa_02_block_store::{StoreBackend, StoreConfig, StoreError};
use dsa_03_detector::{DetectorConfig, DetectorError, DEFAULT_SUFFIX};
use dsa_04_ingestion_gateway::{ConfigError as GatewayConfigError, GatewayConfig};
use dsa_telemetry::TelemetryConfig;
use shared_types::{Classify, ErrorClass, PayloadFormat};
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub log: LogSection,
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
    pub detector: DetectorSection,
    pub telemetry: TelemetryConfig,
}

/// Event log and topic layout.
#[derive(Debug, Clone)]
pub struct LogSection {
    /// `memory://` is the only backend this build ships.
    pub bootstrap: String,
    pub topic: String,
    pub partitions: u32,
    /// Recorded on the topic; the in-process backend keeps one copy.
    pub replication_factor: u16,
    pub key_by_source: bool,
    pub payload_format: PayloadFormat,
    pub producer_queue_capacity: usize,
    pub publish_timeout: Duration,
}

impl Default for LogSection {
    fn default() -> Self {
        let log = LogConfig::default();
        Self {
            bootstrap: MEMORY_BOOTSTRAP.to_string(),
            topic: dsa_03_detector::config::DEFAULT_TOPIC.to_string(),
            partitions: 1,
            replication_factor: 1,
            key_by_source: true,
            payload_format: PayloadFormat::Json,
            producer_queue_capacity: log.producer_queue_capacity,
            publish_timeout: log.publish_timeout,
        }
    }
}

impl LogSection {
    pub fn topic_spec(&self) -> TopicSpec {
        TopicSpec::new(&self.topic, self.partitions, self.replication_factor)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            producer_queue_capacity: self.producer_queue_capacity,
            publish_timeout: self.publish_timeout,
        }
    }
}

/// Detector replicas run by this node.
#[derive(Debug, Clone)]
pub struct DetectorSection {
    pub enabled: bool,
    pub config: DetectorConfig,
    /// A source matches if it ends with any of these.
    pub rule_suffixes: Vec<String>,
    /// Remote gateway for Block calls. `None` calls the local gateway.
    pub gateway_url: Option<String>,
    /// Deadline for one remote Block call.
    pub block_timeout: Duration,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            enabled: true,
            config: DetectorConfig::default(),
            rule_suffixes: vec![DEFAULT_SUFFIX.to_string()],
            gateway_url: None,
            block_timeout: Duration::from_secs(2),
        }
    }
}

impl NodeConfig {
    /// Validate once at startup. Every failure is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        LogBackend::from_bootstrap(&self.log.bootstrap)?;
        self.log.topic_spec().validate()?;
        if self.log.producer_queue_capacity == 0 {
            return Err(ConfigError::invalid("log.producer_queue_capacity", "cannot be 0"));
        }
        if self.log.publish_timeout.is_zero() {
            return Err(ConfigError::invalid("log.publish_timeout", "cannot be 0"));
        }

        StoreBackend::from_address(&self.store.address)?;
        if self.store.op_timeout.is_zero() {
            return Err(ConfigError::invalid("store.op_timeout", "cannot be 0"));
        }
        if self.store.connect_timeout.is_zero() {
            return Err(ConfigError::invalid("store.connect_timeout", "cannot be 0"));
        }

        self.gateway_config().validate()?;

        if self.detector.enabled {
            self.detector_config().validate()?;
            if self.detector.rule_suffixes.is_empty() {
                return Err(ConfigError::invalid("detector.rule_suffixes", "at least one suffix"));
            }
            if self.detector.rule_suffixes.iter().any(|s| s.trim().is_empty()) {
                return Err(ConfigError::invalid("detector.rule_suffixes", "suffix cannot be empty"));
            }
            if self.detector.block_timeout.is_zero() {
                return Err(ConfigError::invalid("detector.block_timeout", "cannot be 0"));
            }
        }
        Ok(())
    }

    /// Gateway config with the publish settings taken from the log section.
    pub fn gateway_config(&self) -> GatewayConfig {
        let mut gateway = self.gateway.clone();
        gateway.publish.topic = self.log.topic.clone();
        gateway.publish.key_by_source = self.log.key_by_source;
        gateway.publish.payload_format = self.log.payload_format;
        gateway.store_op_timeout = self.store.op_timeout;
        gateway
    }

    /// Detector config consuming the configured topic.
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            topic: self.log.topic.clone(),
            ..self.detector.config.clone()
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("gateway: {0}")]
    Gateway(#[from] GatewayConfigError),

    #[error("detector: {0}")]
    Detector(#[from] DetectorError),

    #[error("event log: {0}")]
    Log(#[from] LogError),

    #[error("block store: {0}")]
    Store(#[from] StoreError),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl Classify for ConfigError {
    fn class(&self) -> ErrorClass {
        ErrorClass::IrrecoverableStartup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log.topic, "dns-requests");
        assert_eq!(config.detector_config().group, "dns-detectors");
    }

    #[test]
    fn test_derived_configs_share_the_topic() {
        let mut config = NodeConfig::default();
        config.log.topic = "edge-requests".into();
        config.log.key_by_source = false;
        config.store.op_timeout = Duration::from_millis(75);

        let gateway = config.gateway_config();
        assert_eq!(gateway.publish.topic, "edge-requests");
        assert!(!gateway.publish.key_by_source);
        assert_eq!(gateway.store_op_timeout, Duration::from_millis(75));
        assert_eq!(config.detector_config().topic, "edge-requests");
    }

    #[test]
    fn test_zero_partitions_rejected() {
        let mut config = NodeConfig::default();
        config.log.partitions = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Log(_))));
    }

    #[test]
    fn test_zero_replication_factor_rejected() {
        let mut config = NodeConfig::default();
        config.log.replication_factor = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Log(_))));
    }

    #[test]
    fn test_unsupported_schemes_rejected() {
        let mut config = NodeConfig::default();
        config.log.bootstrap = "broker:9092".into();
        let err = config.validate().unwrap_err();
        assert_eq!(err.class(), ErrorClass::IrrecoverableStartup);

        let mut config = NodeConfig::default();
        config.store.address = "mongodb://localhost:27017".into();
        assert!(matches!(config.validate(), Err(ConfigError::Store(_))));
    }

    #[test]
    fn test_detector_settings_validated() {
        let mut config = NodeConfig::default();
        config.detector.rule_suffixes = vec![" ".into()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = NodeConfig::default();
        config.detector.config.replicas = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Detector(_))));

        config.detector.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_group_rejected() {
        let mut config = NodeConfig::default();
        config.detector.config.group = String::new();
        assert!(config.validate().is_err());
    }
}
