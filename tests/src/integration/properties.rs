//! Block-list guarantees seen through the gateway.

use super::harness::{eventually, DownStore, Pipeline};
use dsa_02_block_store::BlockStore;
use dsa_04_ingestion_gateway::{FallbackPolicy, GatewayConfig};
use shared_types::{AdmitOutcome, Classify, FlagLookup, RequestRecord};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_block_is_idempotent() {
    let (pipeline, store) = Pipeline::new(1).await;

    pipeline.gateway.block("10.0.0.70").await.unwrap();
    pipeline.gateway.block("10.0.0.70").await.unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.get("10.0.0.70").await.unwrap(), FlagLookup::Blocked);
    assert_eq!(pipeline.admit("10.0.0.70", 1).await, AdmitOutcome::Blocked);
}

#[tokio::test]
async fn test_blocked_source_stays_blocked() {
    let (pipeline, _store) = Pipeline::new(2).await;

    assert_eq!(pipeline.admit("192.168.1.70", 1).await, AdmitOutcome::Accepted);
    eventually(|| pipeline.published() == 1).await;

    pipeline.gateway.block("192.168.1.70").await.unwrap();
    for t in 2..22 {
        assert_eq!(pipeline.admit("192.168.1.70", t).await, AdmitOutcome::Blocked);
    }

    // Other sources are untouched, and nothing from the blocked one reached the log.
    assert_eq!(pipeline.admit("192.168.1.71", 30).await, AdmitOutcome::Accepted);
    eventually(|| pipeline.published() == 2).await;
    assert_eq!(pipeline.gateway.metrics().blocked.load(Ordering::Relaxed), 20);
}

#[tokio::test]
async fn test_store_block_seen_without_cache() {
    let store = Arc::new(dsa_02_block_store::InMemoryBlockStore::new());
    let config = GatewayConfig {
        cache_blocked: false,
        ..GatewayConfig::default()
    };
    let pipeline = Pipeline::with_store(config, store.clone(), 1).await;

    store.set_blocked("10.1.1.1").await.unwrap();
    assert_eq!(pipeline.admit("10.1.1.1", 1).await, AdmitOutcome::Blocked);
}

#[tokio::test]
async fn test_store_down_fails_open() {
    let config = GatewayConfig {
        store_fallback: FallbackPolicy::FailOpen,
        ..GatewayConfig::default()
    };
    let pipeline = Pipeline::with_store(config, Arc::new(DownStore), 1).await;

    assert_eq!(pipeline.admit("10.0.0.70", 1).await, AdmitOutcome::Accepted);

    let metrics = pipeline.gateway.metrics().snapshot();
    assert_eq!(metrics.store_errors, 1);
    assert_eq!(metrics.fail_open_admits, 1);
    assert_eq!(metrics.admitted, 1);
    eventually(|| pipeline.published() == 1).await;
}

#[tokio::test]
async fn test_store_down_fails_closed() {
    let config = GatewayConfig {
        store_fallback: FallbackPolicy::FailClosed,
        ..GatewayConfig::default()
    };
    let pipeline = Pipeline::with_store(config, Arc::new(DownStore), 1).await;

    let err = pipeline
        .gateway
        .admit(RequestRecord::new("10.0.0.70", "a.com", "A", 1))
        .await
        .unwrap_err();
    assert!(err.class().is_transient());
    assert_eq!(pipeline.gateway.metrics().snapshot().failed, 1);
    assert_eq!(pipeline.published(), 0);
}

#[tokio::test]
async fn test_block_with_store_down_is_transient_failure() {
    let pipeline = Pipeline::with_store(GatewayConfig::default(), Arc::new(DownStore), 1).await;

    let err = pipeline.gateway.block("10.0.0.70").await.unwrap_err();
    assert!(err.class().is_transient());
    assert_eq!(pipeline.gateway.metrics().snapshot().block_failures, 1);
}
