// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public channel routes: HTML entry page, health probes, build identity and
//! static assets.

use super::AppState;
use crate::mode::ServingMode;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

#[derive(RustEmbed)]
#[folder = "static/"]
struct Assets;

/// Public router, bound on all interfaces.
pub fn routes(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(&state.public_dir);

    Router::new()
        .route("/", get(entry))
        .route("/index.html", get(entry))
        .route("/live", get(live))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .nest_service("/public", assets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /
async fn entry(State(state): State<Arc<AppState>>) -> Response {
    match state.mode {
        ServingMode::Installation => serve_asset("installing.html"),
        ServingMode::Normal => {
            let path = state.public_dir.join("index.html");
            match tokio::fs::read(&path).await {
                Ok(body) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body)
                    .into_response(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => serve_asset("index.html"),
                Err(e) => {
                    state
                        .logger
                        .error(format_args!("failed to read {}: {}", path.display(), e));
                    (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
                        .into_response()
                }
            }
        }
    }
}

/// GET /live
async fn live() -> &'static str {
    "OK"
}

/// GET /ready
async fn ready(State(state): State<Arc<AppState>>) -> Response {
    if state.mode.is_ready() {
        (StatusCode::OK, "READY").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY").into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionBody<'a> {
    version: &'a str,
    schema_version: String,
    runtime_version: &'a str,
    build_date: &'a str,
}

/// GET /version
async fn version(State(state): State<Arc<AppState>>) -> Response {
    let schema_version = match state.recorded_schema_version().await {
        Ok(recorded) => recorded.unwrap_or_default(),
        Err(e) => {
            state
                .logger
                .error(format_args!("failed to read schema version: {}", e));
            return (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
                .into_response();
        }
    };

    Json(VersionBody {
        version: &state.build.version,
        schema_version,
        runtime_version: &state.build.runtime_version,
        build_date: &state.build.build_date,
    })
    .into_response()
}

fn serve_asset(path: &str) -> Response {
    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data,
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}
