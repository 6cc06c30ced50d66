//! HTTP surface: health, deposits, withdrawals, claim, swap, history, SSE events, and
//! Prometheus metrics (§6, §6.1).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use eyre::eyre;
use futures::stream::Stream;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::bridge::error::BridgeError;
use crate::bridge::{BridgeService, ClaimOutcome};
use crate::metrics;
use crate::queue::{self, JobEvent};
use crate::types::EvmAddress;

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<BridgeService>,
    pub hot_wallet: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        metrics::record_error(self.code());
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

async fn liveness() -> &'static str {
    "OK"
}

async fn readiness(State(state): State<AppState>) -> Response {
    match state.bridge.l1.hot_balance().await {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY").into_response(),
    }
}

async fn prometheus_metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response();
    }
    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

async fn deposit_wallet(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "address": state.hot_wallet }))
}

async fn deposit_balance(
    State(state): State<AppState>,
    Path(native): Path<String>,
) -> Result<Json<serde_json::Value>, BridgeError> {
    let balance = state.bridge.ledger.get_balance(&native).await?;
    Ok(Json(json!({ "balance": balance.to_decimal_string(crate::bridge::NATIVE_DECIMALS) })))
}

async fn pending_withdrawals(State(state): State<AppState>) -> Result<Json<serde_json::Value>, BridgeError> {
    let amount = state.bridge.queue.get_pending_withdrawals_amount().await?;
    Ok(Json(json!({ "amount": amount.to_decimal_string(crate::bridge::NATIVE_DECIMALS) })))
}

#[derive(Debug, Deserialize)]
struct WithdrawalRequest {
    paw: String,
    amount: String,
    blockchain: String,
    sig: String,
}

async fn submit_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<WithdrawalRequest>,
) -> Result<StatusCode, BridgeError> {
    // Format-validate the wire fields before queuing; the handler re-derives
    // these from the payload and does the actual business validation
    // (signature verification, balance check) off the request path.
    EvmAddress::from_hex(&req.blockchain).map_err(|_| BridgeError::InvalidOwner)?;
    decode_signature(&req.sig)?;
    let ts = chrono::Utc::now().timestamp_millis();

    let id = format!("withdrawal-{}-{}", req.paw, ts);
    let payload = json!({
        "native": req.paw,
        "amount": req.amount,
        "evm": req.blockchain,
        "sig": req.sig,
        "ts": ts,
        "attempt": 0,
    });
    state
        .bridge
        .queue
        .enqueue("withdrawal", &id, payload, Duration::ZERO, queue::default_max_attempts())
        .await?;
    metrics::record_withdrawal("queued");
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    #[serde(rename = "pawAddress")]
    paw_address: String,
    #[serde(rename = "blockchainAddress")]
    blockchain_address: String,
    sig: String,
}

async fn submit_claim(
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<Response, BridgeError> {
    let evm = EvmAddress::from_hex(&req.blockchain_address).map_err(|_| BridgeError::InvalidOwner)?;
    let signature = decode_signature(&req.sig)?;

    let outcome = state.bridge.claim(&req.paw_address, &evm, &signature).await;
    match &outcome {
        Ok(ClaimOutcome::Ok) => metrics::record_claim("ok"),
        Ok(ClaimOutcome::AlreadyDone) => metrics::record_claim("already_done"),
        Err(e) => metrics::record_claim(e.code()),
    }

    match outcome? {
        ClaimOutcome::Ok => Ok((StatusCode::OK, Json(json!({ "status": "OK" }))).into_response()),
        ClaimOutcome::AlreadyDone => Ok(StatusCode::ACCEPTED.into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct SwapRequest {
    paw: String,
    amount: String,
    blockchain: String,
    sig: String,
}

async fn submit_swap(
    State(state): State<AppState>,
    Json(req): Json<SwapRequest>,
) -> Result<StatusCode, BridgeError> {
    EvmAddress::from_hex(&req.blockchain).map_err(|_| BridgeError::InvalidOwner)?;
    decode_signature(&req.sig)?;
    let ts = chrono::Utc::now().timestamp_millis();

    let id = format!("swap-to-wrapped-{}-{}", req.paw, ts);
    let payload = json!({
        "native": req.paw,
        "amount": req.amount,
        "evm": req.blockchain,
        "sig": req.sig,
        "ts": ts,
    });
    state
        .bridge
        .queue
        .enqueue("swap-to-wrapped", &id, payload, Duration::ZERO, queue::default_max_attempts())
        .await?;
    metrics::record_swap_to_wrapped("queued");
    Ok(StatusCode::CREATED)
}

async fn history(
    State(state): State<AppState>,
    Path((evm, native)): Path<(String, String)>,
) -> Result<Json<crate::db::History>, BridgeError> {
    let history = state.bridge.ledger.history(&evm, &native).await?;
    Ok(Json(history))
}

async fn events(
    State(state): State<AppState>,
    Path(native): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.bridge.queue.subscribe_events();
    let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
        Ok(event) if event.native.as_deref() == Some(native.as_str()) => {
            Some(Ok(job_event_to_sse(&event)))
        }
        Ok(_) => None,
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn job_event_to_sse(event: &JobEvent) -> Event {
    Event::default().event(event.topic.clone()).data(
        json!({
            "jobId": event.job_id,
            "succeeded": event.succeeded,
            "message": event.message,
        })
        .to_string(),
    )
}

fn decode_signature(sig: &str) -> Result<Vec<u8>, BridgeError> {
    let sig = sig.strip_prefix("0x").unwrap_or(sig);
    hex::decode(sig).map_err(|_| BridgeError::InvalidSignature)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .route("/deposits/native/wallet", get(deposit_wallet))
        .route("/deposits/native/:addr", get(deposit_balance))
        .route("/withdrawals/native", post(submit_withdrawal))
        .route("/withdrawals/pending", get(pending_withdrawals))
        .route("/claim", post(submit_claim))
        .route("/swap", post(submit_swap))
        .route("/history/:evm/:native", get(history))
        .route("/events/:native", get(events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the HTTP API until the listener is dropped.
pub async fn serve(
    bind_address: &str,
    port: u16,
    bridge: Arc<BridgeService>,
    hot_wallet: String,
) -> eyre::Result<()> {
    let state = AppState { bridge, hot_wallet };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!(%addr, "HTTP API listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
