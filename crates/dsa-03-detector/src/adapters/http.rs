//! JSON-RPC client for the gateway's `ingest_block` method.

use crate::error::SinkError;
use crate::ports::BlockCommandSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::RpcStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Header carrying the caller's deadline to the gateway.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct BlockParams<'a> {
    source_address: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    status: RpcStatus,
}

/// Sends block commands to a remote gateway over HTTP.
pub struct HttpGatewayClient {
    http_client: reqwest::Client,
    rpc_url: String,
    timeout: Duration,
    request_id: AtomicU64,
}

impl HttpGatewayClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let rpc_url = rpc_url.into();
        let parsed = reqwest::Url::parse(&rpc_url)
            .map_err(|e| SinkError::InvalidEndpoint(format!("{rpc_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SinkError::InvalidEndpoint(format!(
                "{rpc_url}: expected http or https"
            )));
        }
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            http_client,
            rpc_url,
            timeout,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl BlockCommandSink for HttpGatewayClient {
    async fn block(&self, source_address: &str) -> Result<(), SinkError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "ingest_block",
            params: BlockParams { source_address },
            id,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header(REQUEST_TIMEOUT_HEADER, self.timeout.as_millis().to_string())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout(self.timeout)
                } else {
                    SinkError::Unavailable(e.to_string())
                }
            })?;

        let http_status = response.status();
        let rpc_response: JsonRpcResponse<StatusResult> = response
            .json()
            .await
            .map_err(|e| SinkError::Unavailable(format!("unreadable response ({http_status}): {e}")))?;

        if let Some(error) = rpc_response.error {
            return Err(SinkError::Rejected(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }
        match rpc_response.result.map(|r| r.status) {
            Some(RpcStatus::Success) => {
                debug!(source = %source_address, id, "[dsa-03] Block acknowledged by gateway");
                Ok(())
            }
            Some(other) => Err(SinkError::Rejected(format!("status {other}"))),
            None => Err(SinkError::Rejected("response missing result".to_string())),
        }
    }
}
