//! HTTP API server for dashboard integration.
//!
//! Health, session status and the pending QR as a PNG, plus the `/ws`
//! observer socket fed by the status notifier.
//! Spawned as a background task in the gateway.

use crate::notifier::{ObserverFrame, StatusNotifier};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use silvia_channels::qr;
use silvia_core::{config::ApiConfig, state::ConnectionState};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    notifier: Arc<StatusNotifier>,
    api_key: Option<String>,
    uptime: Instant,
}

/// Query string accepted by `/ws`.
#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

type ApiError = (StatusCode, Json<Value>);

/// Constant-time string comparison to prevent timing attacks on API token validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn unauthorized(msg: &str) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg })))
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<ApiError> {
    let key = api_key.as_ref()?;

    let Some(header) = headers.get("authorization") else {
        return Some(unauthorized("missing Authorization header"));
    };
    let Ok(value) = header.to_str() else {
        return Some(unauthorized("invalid Authorization header"));
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None,
        _ => Some(unauthorized("invalid token")),
    }
}

/// `GET /api/health`: Health check with uptime and WhatsApp status.
async fn health(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let snapshot = state.notifier.snapshot().await;
    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "whatsapp": snapshot.state.status().as_str(),
    })))
}

/// `GET /api/status`: Internal session state and published status.
async fn status(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let snapshot = state.notifier.snapshot().await;
    Ok(Json(json!({
        "state": snapshot.state,
        "status": snapshot.state.status(),
        "qr_pending": snapshot.qr.is_some(),
    })))
}

/// `GET /api/qr`: Pending pairing code as a base64 PNG.
async fn pending_qr(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, ApiError> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let snapshot = state.notifier.snapshot().await;
    let Some(code) = snapshot.qr else {
        let status = if snapshot.state == ConnectionState::Connected {
            "paired"
        } else {
            "pending"
        };
        return Ok(Json(json!({ "status": status })));
    };

    let png_bytes = qr::render_png(&code).map_err(|e| {
        error!("QR image generation failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("QR generation failed: {e}")})),
        )
    })?;

    Ok(Json(json!({
        "status": "qr_ready",
        "qr_png_base64": BASE64.encode(&png_bytes),
    })))
}

/// `GET /ws`: Upgrade to the observer socket.
async fn ws_handler(
    Query(params): Query<WsParams>,
    State(state): State<ApiState>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(key) = &state.api_key {
        let ok = params
            .token
            .as_deref()
            .is_some_and(|t| constant_time_eq(t, key));
        if !ok {
            return unauthorized("invalid token").into_response();
        }
    }
    ws.on_upgrade(move |socket| observe(socket, state.notifier))
}

async fn send_frame(socket: &mut WebSocket, frame: &ObserverFrame) -> bool {
    let Ok(text) = serde_json::to_string(frame) else {
        return false;
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

/// Push the current snapshot, then every frame broadcast afterwards.
async fn observe(mut socket: WebSocket, notifier: Arc<StatusNotifier>) {
    // Subscribe before reading the snapshot so nothing falls in between.
    let mut rx = notifier.subscribe();
    for frame in notifier.snapshot().await.frames() {
        if !send_frame(&mut socket, &frame).await {
            return;
        }
    }

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Ok(frame) => {
                    if !send_frame(&mut socket, &frame).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("observer lagged {n} frames");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Observers only listen.
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("observer disconnected");
}

fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/qr", get(pending_qr))
        .route("/ws", get(ws_handler))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Start the API server. Called from `Gateway::run()`.
pub async fn serve(config: ApiConfig, notifier: Arc<StatusNotifier>, uptime: Instant) {
    let api_key = if config.api_key.is_empty() {
        None
    } else {
        Some(config.api_key.clone())
    };

    let app = build_router(ApiState {
        notifier,
        api_key,
        uptime,
    });
    let addr = format!("{}:{}", config.host, config.port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("API server failed to bind to {addr}: {e}");
            return;
        }
    };

    info!("API server listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("API server error: {e}");
    }
}
