//! HTTP server for the gateway.

use crate::domain::GatewayError;
use crate::ingest::IngestionGateway;
use crate::middleware::{TimeoutLayer, TracingLayer};
use crate::rpc::{handle_json_rpc, health_check, metrics_handler, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::info;

pub struct GatewayService {
    gateway: Arc<IngestionGateway>,
}

impl GatewayService {
    pub fn new(gateway: Arc<IngestionGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<IngestionGateway> {
        &self.gateway
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let config = Arc::clone(self.gateway.config());
        let state = AppState {
            gateway: Arc::clone(&self.gateway),
        };

        let middleware = ServiceBuilder::new()
            .layer(TracingLayer::new())
            .layer(TimeoutLayer::new(Arc::clone(&config)));

        Router::new()
            .route("/", post(handle_json_rpc))
            .route("/health", get(health_check))
            .route("/metrics", get(metrics_handler))
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(middleware)
            .with_state(state)
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        bind(self.gateway.config().listen_addr()).await
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Serve(e.to_string()))?;
        info!(addr = %local_addr, "[dsa-04] Gateway listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Serve(e.to_string()))?;

        info!("[dsa-04] Gateway stopped");
        Ok(())
    }
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(addr).await.map_err(|e| GatewayError::Bind {
        addr: addr.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GatewayConfig;
    use crate::middleware::REQUEST_ID_HEADER;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use dsa_01_event_log::{EventLog, InMemoryEventLog, LogConfig, TopicSpec};
    use dsa_02_block_store::InMemoryBlockStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn router_with(config: GatewayConfig) -> Router {
        let (log, _reports) = InMemoryEventLog::start(LogConfig::default());
        log.ensure_topic(&TopicSpec::new(&config.publish.topic, 2, 1))
            .await
            .unwrap();
        let gateway = IngestionGateway::new(config, log, Arc::new(InMemoryBlockStore::new()));
        GatewayService::new(Arc::new(gateway)).router()
    }

    async fn router() -> Router {
        router_with(GatewayConfig::default()).await
    }

    async fn post_json(router: &Router, body: Value) -> (StatusCode, Value) {
        post_raw(router, body.to_string()).await
    }

    async fn post_raw(router: &Router, body: String) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn admit(id: u64, source: &str, t: i64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "ingest_admit",
            "params": {
                "source_address": source,
                "query_target": "api.mywebsite.com",
                "record_kind": "A",
                "observed_at": t
            }
        })
    }

    fn block(id: u64, source: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "ingest_block",
            "params": { "source_address": source }
        })
    }

    #[tokio::test]
    async fn test_admit_then_block_then_blocked() {
        let router = router().await;

        let (status, body) = post_json(&router, admit(1, "10.0.0.70", 1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["status"], "success");

        let (_, body) = post_json(&router, block(2, "10.0.0.70")).await;
        assert_eq!(body["result"]["status"], "success");

        for id in 3..5 {
            let (_, body) = post_json(&router, admit(id, "10.0.0.70", id as i64)).await;
            assert_eq!(body["result"]["status"], "blocked");
        }
    }

    #[tokio::test]
    async fn test_positional_params() {
        let router = router().await;
        let request = json!({
            "jsonrpc": "2.0",
            "id": "abc",
            "method": "ingest_admit",
            "params": ["10.0.0.71", "a.com", "AAAA", 10]
        });
        let (_, body) = post_json(&router, request).await;
        assert_eq!(body["id"], "abc");
        assert_eq!(body["result"]["status"], "success");
    }

    #[tokio::test]
    async fn test_malformed_record_reports_failed() {
        let router = router().await;
        let (_, body) = post_json(&router, admit(1, "   ", 1)).await;
        assert_eq!(body["result"]["status"], "failed");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let router = router().await;

        let (status, body) = post_raw(&router, "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32700);

        let (_, body) = post_json(
            &router,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "ingest_unknown", "params": {} }),
        )
        .await;
        assert_eq!(body["error"]["code"], -32601);

        let (_, body) = post_json(
            &router,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "ingest_block", "params": { "ip": "x" } }),
        )
        .await;
        assert_eq!(body["error"]["code"], -32602);

        let (_, body) = post_json(&router, json!([])).await;
        assert_eq!(body["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_batch_is_processed_in_order() {
        let router = router().await;
        let batch = json!([block(1, "10.0.0.9"), admit(2, "10.0.0.9", 1), admit(3, "10.0.0.8", 1)]);

        let (status, body) = post_json(&router, batch).await;
        assert_eq!(status, StatusCode::OK);
        let responses = body.as_array().unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"]["status"], "success");
        assert_eq!(responses[1]["result"]["status"], "blocked");
        assert_eq!(responses[2]["result"]["status"], "success");
    }

    #[tokio::test]
    async fn test_batch_limit() {
        let config = GatewayConfig {
            max_batch_size: 2,
            ..GatewayConfig::default()
        };
        let router = router_with(config).await;
        let batch = json!([block(1, "a"), block(2, "b"), block(3, "c")]);
        let (_, body) = post_json(&router, batch).await;
        assert_eq!(body["error"]["code"], crate::domain::codes::LIMIT_EXCEEDED);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let config = GatewayConfig {
            max_body_bytes: 64,
            ..GatewayConfig::default()
        };
        let router = router_with(config).await;
        let (status, _) = post_json(&router, admit(1, &"1".repeat(200), 1)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let router = router().await;
        dsa_telemetry::register_metrics().unwrap();
        post_json(&router, admit(1, "10.0.0.1", 1)).await;

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 16).await.unwrap();
        let health: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["store"], "memory");

        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("dsa_gateway_admissions_total"));
    }

    #[tokio::test]
    async fn test_serve_on_ephemeral_port() {
        let (log, _reports) = InMemoryEventLog::start(LogConfig::default());
        let gateway = IngestionGateway::new(
            GatewayConfig::default(),
            log,
            Arc::new(InMemoryBlockStore::new()),
        );
        let service = GatewayService::new(Arc::new(gateway));
        let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(service.serve(listener, async move {
            let _ = stopped.await;
        }));

        let stream = tokio::net::TcpStream::connect(addr).await;
        assert!(stream.is_ok());
        drop(stream);

        stop.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_startup_error() {
        let first = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let taken = first.local_addr().unwrap();
        let err = bind(taken).await.unwrap_err();
        assert!(matches!(err, GatewayError::Bind { .. }));
    }
}
