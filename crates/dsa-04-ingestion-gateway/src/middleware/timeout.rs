//! Per-request deadline.
//!
//! Callers propagate their deadline in `x-request-timeout-ms`. It is capped
//! by `max_request_timeout`; requests without one get `request_timeout`.

use crate::domain::config::GatewayConfig;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::Response,
};
use shared_types::RpcStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::warn;

pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Timeout layer
#[derive(Clone)]
pub struct TimeoutLayer {
    config: Arc<GatewayConfig>,
}

impl TimeoutLayer {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Timeout service
#[derive(Clone)]
pub struct TimeoutService<S> {
    inner: S,
    config: Arc<GatewayConfig>,
}

impl<S> Service<Request<Body>> for TimeoutService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let deadline = self.config.effective_timeout(requested_timeout(&req));
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match timeout(deadline, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_ms = deadline.as_millis() as u64, "[dsa-04] Request timed out");
                    Ok(timeout_response())
                }
            }
        })
    }
}

/// Deadline hint sent by the caller, if any and parseable.
fn requested_timeout<B>(req: &Request<B>) -> Option<Duration> {
    req.headers()
        .get(REQUEST_TIMEOUT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_millis)
}

/// 504 carrying the same `failed` status an in-time failure would.
fn timeout_response() -> Response {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": null,
        "result": { "status": RpcStatus::Failed },
    });

    let mut response = Response::new(Body::from(serde_json::to_vec(&body).unwrap_or_default()));
    *response.status_mut() = StatusCode::GATEWAY_TIMEOUT;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
