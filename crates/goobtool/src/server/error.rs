// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listener and request error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::ConfigError;

/// Listener-level errors.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{channel} listener bind failed on {addr}: {source}")]
    Bind {
        channel: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("admin listener resolved to non-loopback address {0}")]
    NotLoopback(SocketAddr),

    #[error("{channel} listener failed: {source}")]
    Listener {
        channel: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Standard admin error body: `{"error": "<code>", "message": "<text>"}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_acceptable() -> Self {
        Self::new(
            StatusCode::NOT_ACCEPTABLE,
            "not_acceptable",
            "Accept must include application/json",
        )
    }

    pub fn unsupported_media_type() -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            "Content-Type must be application/json",
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "no such admin route")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
