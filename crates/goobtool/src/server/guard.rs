// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Content-negotiation guard for the admin channel.
//!
//! Layered once over the whole admin router, so no admin route (or its
//! fallback) is reachable without passing it.

use super::error::ApiError;
use axum::{
    extract::Request,
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

const JSON: &str = "application/json";

/// Middleware entry point, for `axum::middleware::from_fn`.
pub async fn require_json(request: Request, next: Next) -> Response {
    if let Err(rejection) = check(request.method(), request.headers()) {
        return rejection.into_response();
    }
    next.run(request).await
}

/// Evaluate the negotiation rules for one request.
///
/// - `Accept` present without `application/json` => 406
/// - a body-carrying method whose `Content-Type` is not JSON => 415
pub fn check(method: &Method, headers: &HeaderMap) -> Result<(), ApiError> {
    let mut accept = headers.get_all(header::ACCEPT).iter().peekable();
    if accept.peek().is_some() {
        let acceptable = accept.any(|value| {
            value
                .to_str()
                .map(|v| v.to_ascii_lowercase().contains(JSON))
                .unwrap_or(false)
        });
        if !acceptable {
            return Err(ApiError::not_acceptable());
        }
    }

    if !is_read_only(method) {
        let json_body = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_start().to_ascii_lowercase().starts_with(JSON))
            .unwrap_or(false);
        if !json_body {
            return Err(ApiError::unsupported_media_type());
        }
    }

    Ok(())
}

fn is_read_only(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_get_without_headers_passes() {
        assert!(check(&Method::GET, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn test_html_accept_is_not_acceptable() {
        let err = check(&Method::GET, &headers(&[(header::ACCEPT, "text/html")])).unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_ACCEPTABLE);
        assert_eq!(err.code, "not_acceptable");
    }

    #[test]
    fn test_json_accept_among_others_passes() {
        let map = headers(&[(header::ACCEPT, "text/html, application/json;q=0.9")]);
        assert!(check(&Method::GET, &map).is_ok());

        let split = headers(&[
            (header::ACCEPT, "text/html"),
            (header::ACCEPT, "application/json"),
        ]);
        assert!(check(&Method::GET, &split).is_ok());
    }

    #[test]
    fn test_text_body_is_unsupported() {
        let err = check(
            &Method::POST,
            &headers(&[(header::CONTENT_TYPE, "text/plain")]),
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.code, "unsupported_media_type");
    }

    #[test]
    fn test_post_without_content_type_is_unsupported() {
        let err = check(&Method::POST, &HeaderMap::new()).unwrap_err();
        assert_eq!(err.code, "unsupported_media_type");
    }

    #[test]
    fn test_json_body_with_charset_passes() {
        let map = headers(&[
            (header::CONTENT_TYPE, "application/json; charset=utf-8"),
            (header::ACCEPT, "application/json"),
        ]);
        assert!(check(&Method::POST, &map).is_ok());
        assert!(check(&Method::PUT, &map).is_ok());
    }

    #[test]
    fn test_accept_checked_before_content_type() {
        let map = headers(&[
            (header::ACCEPT, "text/html"),
            (header::CONTENT_TYPE, "text/plain"),
        ]);
        let err = check(&Method::POST, &map).unwrap_err();
        assert_eq!(err.code, "not_acceptable");
    }
}
