// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Status API
//!
//! Builds the axum router for the node's HTTP interface. All endpoints share
//! application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path       | Description                         |
//! |--------|------------|-------------------------------------|
//! | GET    | `/health`  | Liveness check                      |
//! | GET    | `/status`  | Node id, height, head, peers, pool  |
//! | GET    | `/metrics` | Prometheus text exposition          |

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use minichain_protocol::config::PROTOCOL_VERSION;
use minichain_protocol::network::NodeHandle;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub node: NodeHandle,
    pub metrics: SharedMetrics,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub node_id: String,
    pub version: String,
    pub protocol_version: String,
    pub height: u32,
    pub head_hash: String,
    pub peers: Vec<String>,
    pub mempool_len: usize,
}

impl StatusResponse {
    fn collect(node: &NodeHandle) -> Self {
        Self {
            node_id: node.node_id().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            height: node.height(),
            head_hash: node.head_hash().to_hex(),
            peers: node.peers().iter().map(ToString::to_string).collect(),
            mempool_len: node.mempool_len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse::collect(&state.node))
}

/// Returns HTTP 500 if encoding fails.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.observe(&state.node);
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
