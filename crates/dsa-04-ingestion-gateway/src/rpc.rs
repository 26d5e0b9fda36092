//! JSON-RPC 2.0 handlers.
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `ingest_admit` | `{source_address, query_target, record_kind, observed_at}` or the same four positionally | `{"status": "success" \| "blocked" \| "failed"}` |
//! | `ingest_block` | `{source_address}` or `[source_address]` | `{"status": "success" \| "failed"}` |
//!
//! Protocol problems get standard JSON-RPC errors. Admit and Block failures
//! are only ever reported as `status: failed`.

use crate::domain::ApiError;
use crate::ingest::IngestionGateway;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use dsa_telemetry::{encode_metrics, metric_inc, RPC_REQUESTS};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::{RequestRecord, RpcStatus};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

pub const METHOD_ADMIT: &str = "ingest_admit";
pub const METHOD_BLOCK: &str = "ingest_block";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<IngestionGateway>,
}

#[derive(Debug, Deserialize)]
struct AdmitParams {
    source_address: String,
    query_target: String,
    record_kind: String,
    observed_at: i64,
}

impl From<AdmitParams> for RequestRecord {
    fn from(p: AdmitParams) -> Self {
        RequestRecord::new(p.source_address, p.query_target, p.record_kind, p.observed_at)
    }
}

#[derive(Debug, Deserialize)]
struct BlockParams {
    source_address: String,
}

/// Handle a JSON-RPC request or batch
pub async fn handle_json_rpc(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let request: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            state.gateway.metrics().record_request(false);
            return (
                StatusCode::BAD_REQUEST,
                Json(error_response(Value::Null, ApiError::parse_error(e))),
            );
        }
    };

    let response = match request {
        Value::Array(requests) => {
            let max = state.gateway.config().max_batch_size;
            if requests.is_empty() {
                error_response(Value::Null, ApiError::invalid_request("empty batch"))
            } else if requests.len() > max {
                error_response(Value::Null, ApiError::batch_too_large(max))
            } else {
                let mut responses = Vec::with_capacity(requests.len());
                for req in &requests {
                    responses.push(process_single_request(&state, req).await);
                }
                Value::Array(responses)
            }
        }
        single => process_single_request(&state, &single).await,
    };

    (StatusCode::OK, Json(response))
}

/// Process a single JSON-RPC request
async fn process_single_request(state: &AppState, request: &Value) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);

    if let Err(e) = validate_envelope(request, &id) {
        state.gateway.metrics().record_request(false);
        return error_response(Value::Null, e);
    }

    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    let params = request.get("params");

    match route_method(state, method, params).await {
        Ok(value) => {
            state.gateway.metrics().record_request(true);
            json!({ "jsonrpc": "2.0", "id": id, "result": value })
        }
        Err(e) => {
            state.gateway.metrics().record_request(false);
            metric_inc!(RPC_REQUESTS, &[method_label(method), "error"]);
            error_response(id, e)
        }
    }
}

fn validate_envelope(request: &Value, id: &Value) -> Result<(), ApiError> {
    if !request.is_object() {
        return Err(ApiError::invalid_request("expected an object"));
    }
    if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(ApiError::invalid_request("jsonrpc must be \"2.0\""));
    }
    match id {
        Value::Null | Value::Number(_) => {}
        Value::String(s) if !s.is_empty() && s.len() <= 256 => {}
        Value::String(_) => {
            return Err(ApiError::invalid_request("id string must be 1 to 256 chars"))
        }
        _ => return Err(ApiError::invalid_request("id must be string or number")),
    }
    match request.get("method") {
        Some(Value::String(m)) if !m.is_empty() => Ok(()),
        _ => Err(ApiError::invalid_request("missing method")),
    }
}

/// Route a JSON-RPC method to its handler.
async fn route_method(
    state: &AppState,
    method: &str,
    params: Option<&Value>,
) -> Result<Value, ApiError> {
    let status = match method {
        METHOD_ADMIT => {
            let params: AdmitParams = parse_params(params)?;
            match state.gateway.admit(params.into()).await {
                Ok(outcome) => RpcStatus::from(outcome),
                Err(e) => {
                    debug!(error = %e, "[dsa-04] Admit failed");
                    RpcStatus::Failed
                }
            }
        }
        METHOD_BLOCK => {
            let params: BlockParams = parse_params(params)?;
            match state.gateway.block(&params.source_address).await {
                Ok(()) => RpcStatus::Success,
                Err(e) => {
                    debug!(error = %e, "[dsa-04] Block failed");
                    RpcStatus::Failed
                }
            }
        }
        _ => return Err(ApiError::method_not_found(method)),
    };

    metric_inc!(RPC_REQUESTS, &[method, status.as_str()]);
    Ok(json!({ "status": status }))
}

/// Decode params given by name or by position.
///
/// A single object wrapped in an array (`[{...}]`) is accepted as well.
fn parse_params<T: DeserializeOwned>(params: Option<&Value>) -> Result<T, ApiError> {
    let value = match params {
        None | Some(Value::Null) => return Err(ApiError::invalid_params("missing params")),
        Some(Value::Array(items)) if items.len() == 1 && items[0].is_object() => items[0].clone(),
        Some(v) => v.clone(),
    };
    serde_json::from_value(value).map_err(ApiError::invalid_params)
}

fn method_label(method: &str) -> &'static str {
    match method {
        METHOD_ADMIT => METHOD_ADMIT,
        METHOD_BLOCK => METHOD_BLOCK,
        _ => "unknown",
    }
}

fn error_response(id: Value, error: ApiError) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = &state.gateway;
    Json(json!({
        "status": "ok",
        "store": gateway.store_backend(),
        "store_circuit": gateway.breaker().state().to_string(),
        "admitted": gateway.metrics().admitted.load(Ordering::Relaxed),
        "blocked": gateway.metrics().blocked.load(Ordering::Relaxed),
    }))
}

/// Prometheus text exposition
pub async fn metrics_handler() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            e.to_string(),
        ),
    }
}
