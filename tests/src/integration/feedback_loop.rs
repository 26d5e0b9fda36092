//! Gateway -> event log -> detector -> gateway.

use super::harness::{eventually, CountingSink, Pipeline, GROUP, TOPIC};
use dsa_02_block_store::InMemoryBlockStore;
use dsa_04_ingestion_gateway::GatewayConfig;
use node_runtime::adapters::LocalGatewaySink;
use shared_types::{AdmitOutcome, Classify, ErrorClass, PayloadFormat, RequestRecord};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_flagged_source_is_blocked_after_detection() {
    let (pipeline, store) = Pipeline::new(1).await;
    let (pool, sink) = pipeline.start_detector(1).await;

    assert_eq!(pipeline.admit("10.0.0.70", 1).await, AdmitOutcome::Accepted);
    eventually(|| sink.delivered() >= 1).await;

    assert_eq!(pipeline.admit("10.0.0.70", 2).await, AdmitOutcome::Blocked);
    assert_eq!(store.len(), 1);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_delimited_payload_blocks_the_admitted_key() {
    let store = Arc::new(InMemoryBlockStore::new());
    let mut config = GatewayConfig::default();
    config.publish.payload_format = PayloadFormat::Delimited;
    let pipeline = Pipeline::with_store(config, store.clone(), 1).await;
    let (pool, sink) = pipeline.start_detector(1).await;

    // The decoder trims fields, so a padded key could never match its block.
    let err = pipeline
        .gateway
        .admit(RequestRecord::new(" 10.0.0.70", "api.mywebsite.com", "A", 1))
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::MalformedInput);
    assert_eq!(pipeline.published(), 0);

    assert_eq!(pipeline.admit("10.0.0.70", 2).await, AdmitOutcome::Accepted);
    eventually(|| sink.delivered() >= 1).await;

    for t in 3..6 {
        assert_eq!(pipeline.admit("10.0.0.70", t).await, AdmitOutcome::Blocked);
    }
    assert_eq!(store.len(), 1);
    assert_eq!(pipeline.published(), 1);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_clean_source_never_blocked() {
    let (pipeline, store) = Pipeline::new(1).await;
    let (pool, sink) = pipeline.start_detector(1).await;

    for t in 1..=3 {
        assert_eq!(pipeline.admit("10.0.0.71", t).await, AdmitOutcome::Accepted);
    }
    eventually(|| pool.detector().stats().processed == 3).await;

    assert_eq!(pipeline.admit("10.0.0.71", 4).await, AdmitOutcome::Accepted);
    assert_eq!(sink.calls(), 0);
    assert!(store.is_empty());

    pool.shutdown().await;
}

#[tokio::test]
async fn test_block_retried_until_delivered() {
    let (pipeline, _store) = Pipeline::new(1).await;
    let local = Arc::new(LocalGatewaySink::new(Arc::clone(&pipeline.gateway)));
    // block_retries = 1, so the first entry is rewound once before it lands.
    let sink = Arc::new(CountingSink::new(local, 3));
    let pool = pipeline.start_detector_with(sink.clone(), 1).await;

    for t in 1..=5 {
        assert_eq!(pipeline.admit("10.0.0.70", t).await, AdmitOutcome::Accepted);
    }
    eventually(|| sink.delivered() >= 1).await;

    assert!(sink.calls() >= 4);
    assert!(pool.detector().stats().rewound >= 1);
    assert_eq!(pipeline.admit("10.0.0.70", 6).await, AdmitOutcome::Blocked);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_replicas_share_partitions() {
    let (pipeline, store) = Pipeline::new(4).await;
    let (pool, sink) = pipeline.start_detector(2).await;
    assert_eq!(pipeline.log.group_size(TOPIC, GROUP).unwrap(), 2);

    let flagged: Vec<String> = (1..=8).map(|n| format!("10.0.{n}.70")).collect();
    for (t, source) in flagged.iter().enumerate() {
        pipeline.admit(source, t as i64).await;
        pipeline.admit(&format!("10.0.{t}.1"), t as i64).await;
    }

    eventually(|| store.len() == flagged.len()).await;
    for source in &flagged {
        assert_eq!(pipeline.admit(source, 100).await, AdmitOutcome::Blocked);
    }
    assert!(sink.delivered() >= flagged.len() as u32);

    pool.shutdown().await;
    assert_eq!(pipeline.log.group_size(TOPIC, GROUP).unwrap(), 0);
}

#[tokio::test]
async fn test_every_admitted_record_is_acknowledged() {
    let (pipeline, _store) = Pipeline::new(2).await;

    for t in 0..10 {
        pipeline.admit(&format!("172.16.0.{t}"), t).await;
    }
    eventually(|| pipeline.published() == 10).await;

    pipeline.log.shutdown();
    let stats = tokio::time::timeout(Duration::from_secs(5), pipeline.acknowledger)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.delivered, 10);
    assert_eq!(stats.failed, 0);
}
