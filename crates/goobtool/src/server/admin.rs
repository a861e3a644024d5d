// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Admin channel routes (loopback only, JSON only).

use super::{guard, ApiError, AppState, ShutdownReason};
use axum::{
    body::Bytes,
    extract::{Query, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Admin router. The guard wraps every route and the fallback.
///
/// Shutdown and restart change state, so they answer POST only.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/status", get(status))
        .route("/admin/echo", get(echo_query).post(echo_body))
        .route("/admin/shutdown", post(shutdown))
        .route("/admin/restart", post(restart))
        .fallback(not_found)
        .layer(middleware::from_fn(guard::require_json))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    version: String,
    schema_version: String,
    build_date: String,
    time: String,
    mode: &'static str,
}

/// GET /admin/status
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusBody> {
    Json(StatusBody {
        version: state.build.version.clone(),
        schema_version: state.build.schema_version.clone(),
        build_date: state.build.build_date.clone(),
        time: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        mode: state.mode.status_label(),
    })
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Echo {
    #[serde(default)]
    echo: String,
}

#[derive(Deserialize)]
struct EchoQuery {
    #[serde(default)]
    q: String,
}

/// GET /admin/echo?q=<value>
async fn echo_query(Query(query): Query<EchoQuery>) -> Json<Echo> {
    Json(Echo { echo: query.q })
}

/// POST /admin/echo
async fn echo_body(body: Bytes) -> Result<Json<Echo>, ApiError> {
    let payload: Echo = serde_json::from_slice(&body)
        .map_err(|_| ApiError::invalid_request("invalid JSON body"))?;
    Ok(Json(payload))
}

#[derive(Serialize)]
struct Ack {
    status: &'static str,
}

/// POST /admin/shutdown
///
/// Answers first; the shutdown itself fires after the flush delay so the
/// acknowledgement reaches the caller.
async fn shutdown(State(state): State<Arc<AppState>>) -> Json<Ack> {
    state
        .logger
        .info(format_args!("shutdown requested on admin channel"));
    state
        .shutdown
        .trigger_after(state.flush_delay, ShutdownReason::AdminRequest);
    Json(Ack {
        status: "shutting down",
    })
}

/// POST /admin/restart
async fn restart(State(state): State<Arc<AppState>>) -> Json<Ack> {
    state
        .logger
        .info(format_args!("restart requested on admin channel"));
    state
        .shutdown
        .trigger_after(state.flush_delay, ShutdownReason::Restart);
    Json(Ack {
        status: "restarting",
    })
}

async fn not_found() -> Response {
    ApiError::not_found().into_response()
}
