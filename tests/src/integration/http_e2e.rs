//! JSON-RPC over a real socket, gateway bound on an ephemeral port.

use super::harness::{eventually, Pipeline};
use dsa_03_detector::HttpGatewayClient;
use dsa_04_ingestion_gateway::{bind, GatewayService};
use node_runtime::{NodeConfig, NodeRuntime};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Server {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), dsa_04_ingestion_gateway::GatewayError>>,
}

impl Server {
    async fn start(pipeline: &Pipeline) -> Self {
        let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let service = GatewayService::new(Arc::clone(&pipeline.gateway));
        let task = tokio::spawn(service.serve(listener, async move {
            let _ = stopped.await;
        }));
        Self { addr, stop, task }
    }

    fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    async fn stop(self) {
        self.stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

async fn call(client: &reqwest::Client, url: &str, method: &str, params: Value) -> Value {
    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
    let response = client.post(url).json(&body).send().await.unwrap();
    assert!(response.status().is_success());
    let value: Value = response.json().await.unwrap();
    value["result"]["status"].clone()
}

fn admit_params(source: &str, t: i64) -> Value {
    json!({
        "source_address": source,
        "query_target": "api.mywebsite.com",
        "record_kind": "A",
        "observed_at": t
    })
}

#[tokio::test]
async fn test_admit_block_admit_over_http() {
    let (pipeline, _store) = Pipeline::new(1).await;
    let server = Server::start(&pipeline).await;
    let client = reqwest::Client::new();
    let url = server.url();

    let status = call(&client, &url, "ingest_admit", admit_params("10.0.0.70", 1)).await;
    assert_eq!(status, "success");

    let status = call(&client, &url, "ingest_block", json!({ "source_address": "10.0.0.70" })).await;
    assert_eq!(status, "success");

    for t in 2..4 {
        let status = call(&client, &url, "ingest_admit", admit_params("10.0.0.70", t)).await;
        assert_eq!(status, "blocked");
    }

    server.stop().await;
}

#[tokio::test]
async fn test_detector_blocks_through_http_client() {
    let (pipeline, store) = Pipeline::new(1).await;
    let server = Server::start(&pipeline).await;
    let sink = Arc::new(HttpGatewayClient::new(server.url(), Duration::from_secs(2)).unwrap());
    let pool = pipeline.start_detector_with(sink, 1).await;
    let client = reqwest::Client::new();
    let url = server.url();

    let status = call(&client, &url, "ingest_admit", admit_params("10.0.0.70", 1)).await;
    assert_eq!(status, "success");
    eventually(|| store.len() == 1).await;

    let status = call(&client, &url, "ingest_admit", admit_params("10.0.0.70", 2)).await;
    assert_eq!(status, "blocked");

    pool.shutdown().await;
    server.stop().await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let (pipeline, _store) = Pipeline::new(1).await;
    let server = Server::start(&pipeline).await;

    let health: Value = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["store_circuit"], "closed");

    server.stop().await;
}

#[tokio::test]
async fn test_full_node_over_http() {
    let mut config = NodeConfig::default();
    config.gateway.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.gateway.port = 0;
    config.detector.config.poll_timeout = Duration::from_millis(20);

    let runtime = NodeRuntime::start(config).await.unwrap();
    let url = format!("http://{}/", runtime.local_addr());
    let client = reqwest::Client::new();

    let status = call(&client, &url, "ingest_admit", admit_params("10.0.0.70", 1)).await;
    assert_eq!(status, "success");
    for t in 1..=3 {
        let status = call(&client, &url, "ingest_admit", admit_params("10.0.0.71", t)).await;
        assert_eq!(status, "success");
    }

    eventually(|| runtime.detector_stats().map(|s| s.blocked) == Some(1)).await;
    let status = call(&client, &url, "ingest_admit", admit_params("10.0.0.70", 2)).await;
    assert_eq!(status, "blocked");
    let status = call(&client, &url, "ingest_admit", admit_params("10.0.0.71", 4)).await;
    assert_eq!(status, "success");

    let report = runtime.shutdown().await;
    assert_eq!(report.admitted, 5);
    assert_eq!(report.blocked, 1);
    assert_eq!(report.delivery.delivered, 5);
}
