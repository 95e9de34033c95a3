//! axum server wiring.
//!
//! The relay exposes:
//! - `/healthz` and `/readyz`
//! - `POST /v1/messages`: accept a normalized message for buffering
//! - `GET /v1/queues/{key}`: current unflushed depth for a sender
//! - `DELETE /v1/queues/{key}`: cancel the open window and discard buffered messages

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::{
    buffer::{BufferConfig, BufferManager, SubmitError},
    config::RelayConfig,
    message::IncomingEnvelope,
    responder::HttpResponder,
};

#[derive(Clone)]
struct AppState {
    buffers: BufferManager,
}

fn build_app(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .route("/v1/messages", post(ingest_message))
        .route("/v1/queues/{key}", get(queue_depth).delete(clear_queue))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

pub async fn run(cfg: RelayConfig) -> anyhow::Result<()> {
    let responder = Arc::new(HttpResponder::new(cfg.responder_url.clone()));
    let buffers = BufferManager::new(
        responder,
        BufferConfig {
            quiet_window: Duration::from_millis(cfg.quiet_window_ms),
            max_queue_depth_per_key: cfg.max_queue_depth_per_key,
            idle_ttl: Duration::from_millis(cfg.idle_ttl_ms),
        },
    );

    let app = build_app(AppState { buffers }, cfg.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    tracing::info!(
        listen_addr = %cfg.listen_addr,
        responder_url = %cfg.responder_url,
        quiet_window_ms = cfg.quiet_window_ms,
        "listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ingest_message(
    State(state): State<AppState>,
    Json(envelope): Json<IncomingEnvelope>,
) -> axum::response::Response {
    let key = envelope.sender.phone;
    match state.buffers.submit(&key, envelope.message) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(SubmitError::QueueFull) => {
            tracing::debug!(
                event = "submit_rejected",
                reason = "queue_full",
                key = %key,
                "message rejected"
            );
            (StatusCode::TOO_MANY_REQUESTS, "queue full").into_response()
        }
        Err(SubmitError::BufferClosed) => {
            tracing::debug!(
                event = "submit_rejected",
                reason = "buffer_closed",
                key = %key,
                "message rejected"
            );
            (StatusCode::TOO_MANY_REQUESTS, "buffer closed").into_response()
        }
    }
}

async fn queue_depth(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "key": key,
        "depth": state.buffers.queue_depth(&key),
    }))
}

async fn clear_queue(State(state): State<AppState>, Path(key): Path<String>) -> StatusCode {
    state.buffers.clear_key(&key).await;
    StatusCode::NO_CONTENT
}
