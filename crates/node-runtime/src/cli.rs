//! Command line and environment overrides.
//!
//! Every flag also reads a `DSA_*` variable. Anything left unset keeps the
//! default from [`NodeConfig`].

use crate::container::NodeConfig;
use clap::Parser;
use dsa_04_ingestion_gateway::FallbackPolicy;
use dsa_telemetry::TelemetryConfig;
use shared_types::PayloadFormat;
use std::net::IpAddr;
use std::time::Duration;

/// DNS stream analyzer node: gateway, event log, detector and acknowledger.
#[derive(Parser, Debug)]
#[command(name = "dsa-node")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // --- event log ---------------------------------------------------------
    /// Event log bootstrap address
    #[arg(long, env = "DSA_LOG_BOOTSTRAP")]
    pub log_bootstrap: Option<String>,

    /// Topic admitted records are published to
    #[arg(long, env = "DSA_TOPIC")]
    pub topic: Option<String>,

    #[arg(long, env = "DSA_PARTITIONS")]
    pub partitions: Option<u32>,

    #[arg(long, env = "DSA_REPLICATION_FACTOR")]
    pub replication_factor: Option<u16>,

    /// Key records by source address (true/false)
    #[arg(long, env = "DSA_KEY_BY_SOURCE")]
    pub key_by_source: Option<bool>,

    /// Producer payload format: json or delimited
    #[arg(long, env = "DSA_PAYLOAD_FORMAT")]
    pub payload_format: Option<PayloadFormat>,

    #[arg(long, env = "DSA_PUBLISH_TIMEOUT_MS")]
    pub publish_timeout_ms: Option<u64>,

    // --- block store -------------------------------------------------------
    /// Block store address (memory:// or redis://host:port[/db])
    #[arg(long, env = "DSA_STORE_ADDR")]
    pub store_address: Option<String>,

    #[arg(long, env = "DSA_STORE_KEY_PREFIX")]
    pub store_key_prefix: Option<String>,

    #[arg(long, env = "DSA_STORE_OP_TIMEOUT_MS")]
    pub store_op_timeout_ms: Option<u64>,

    // --- gateway -----------------------------------------------------------
    #[arg(long, env = "DSA_LISTEN_HOST")]
    pub host: Option<IpAddr>,

    /// JSON-RPC listen port
    #[arg(long, env = "DSA_RPC_PORT")]
    pub port: Option<u16>,

    /// Admission when the block store is unreachable: fail_open or fail_closed
    #[arg(long, env = "DSA_STORE_FALLBACK")]
    pub store_fallback: Option<FallbackPolicy>,

    #[arg(long, env = "DSA_CACHE_BLOCKED")]
    pub cache_blocked: Option<bool>,

    #[arg(long, env = "DSA_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    // --- detector ----------------------------------------------------------
    /// Run detector replicas in this node (true/false)
    #[arg(long, env = "DSA_DETECTOR_ENABLED")]
    pub detector_enabled: Option<bool>,

    #[arg(long, env = "DSA_GROUP")]
    pub group: Option<String>,

    #[arg(long, env = "DSA_REPLICAS")]
    pub replicas: Option<usize>,

    /// Comma-separated source suffixes flagged as malicious
    #[arg(long, env = "DSA_RULE_SUFFIX", value_delimiter = ',')]
    pub rule_suffix: Vec<String>,

    #[arg(long, env = "DSA_POLL_TIMEOUT_MS")]
    pub poll_timeout_ms: Option<u64>,

    #[arg(long, env = "DSA_BLOCK_RETRIES")]
    pub block_retries: Option<u32>,

    /// Send Block commands to a remote gateway instead of the local one
    #[arg(long, env = "DSA_GATEWAY_URL")]
    pub gateway_url: Option<String>,

    // --- telemetry ---------------------------------------------------------
    /// Log filter, e.g. `info` or `dsa_03_detector=debug,info`
    #[arg(long, env = "DSA_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, env = "DSA_JSON_LOGS")]
    pub json_logs: Option<bool>,
}

impl Cli {
    /// Overlay the given flags on the defaults.
    pub fn into_config(self) -> NodeConfig {
        let mut config = NodeConfig {
            telemetry: TelemetryConfig::from_env(),
            ..NodeConfig::default()
        };

        let log = &mut config.log;
        set(&mut log.bootstrap, self.log_bootstrap);
        set(&mut log.topic, self.topic);
        set(&mut log.partitions, self.partitions);
        set(&mut log.replication_factor, self.replication_factor);
        set(&mut log.key_by_source, self.key_by_source);
        set(&mut log.payload_format, self.payload_format);
        set(&mut log.publish_timeout, self.publish_timeout_ms.map(Duration::from_millis));

        let store = &mut config.store;
        set(&mut store.address, self.store_address);
        set(&mut store.key_prefix, self.store_key_prefix);
        set(&mut store.op_timeout, self.store_op_timeout_ms.map(Duration::from_millis));

        let gateway = &mut config.gateway;
        set(&mut gateway.host, self.host);
        set(&mut gateway.port, self.port);
        set(&mut gateway.store_fallback, self.store_fallback);
        set(&mut gateway.cache_blocked, self.cache_blocked);
        set(&mut gateway.request_timeout, self.request_timeout_ms.map(Duration::from_millis));
        if gateway.max_request_timeout < gateway.request_timeout {
            gateway.max_request_timeout = gateway.request_timeout;
        }

        let detector = &mut config.detector;
        set(&mut detector.enabled, self.detector_enabled);
        set(&mut detector.config.group, self.group);
        set(&mut detector.config.replicas, self.replicas);
        set(&mut detector.config.poll_timeout, self.poll_timeout_ms.map(Duration::from_millis));
        set(&mut detector.config.block_retries, self.block_retries);
        if !self.rule_suffix.is_empty() {
            detector.rule_suffixes = self.rule_suffix;
        }
        set(&mut detector.gateway_url, self.gateway_url.map(Some));

        let telemetry = &mut config.telemetry;
        set(&mut telemetry.log_level, self.log_level);
        if let Some(json) = self.json_logs {
            telemetry.json_logs = json;
            telemetry.ansi = !json;
        }

        config
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
