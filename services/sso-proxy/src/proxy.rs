//! Upstream forwarding
//!
//! The protected application. Requests reaching this point already passed
//! the gateway; they are forwarded to the upstream URL with hop-by-hop
//! and `Host` headers stripped and the authenticated user id attached.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use sso::CurrentUser;
use tracing::{error, instrument};

use crate::metrics::{record_upstream, record_upstream_error};

/// Headers to strip before forwarding (hop-by-hop per RFC 2616 Section 13.5.1)
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Upstream sees the authenticated user id here. Never taken from the client.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-sso-user-id");

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct ProxyState {
    pub client: reqwest::Client,
    pub upstream_url: String,
    pub timeout: Duration,
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
}

impl ProxyState {
    pub fn new(upstream_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            upstream_url: upstream_url.into(),
            timeout,
            requests_total: Arc::default(),
            errors_total: Arc::default(),
        }
    }

    fn failed(&self, error_type: &'static str) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        record_upstream_error(error_type);
    }
}

/// JSON error body: {"error":{"type":"proxy_error","message":"...","request_id":"req_..."}}
fn error_response(status: StatusCode, message: &str, request_id: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": "proxy_error",
            "message": message,
            "request_id": request_id,
        }
    });
    (status, [(CONTENT_TYPE, "application/json")], body.to_string()).into_response()
}

/// Catch-all handler behind the gateway.
pub async fn handler(
    State(state): State<ProxyState>,
    user: Option<CurrentUser>,
    request: Request,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    forward(&state, user, request, request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id, method = %request.method(), path = %request.uri().path()))]
async fn forward(
    state: &ProxyState,
    user: Option<CurrentUser>,
    request: Request,
    request_id: String,
) -> Response {
    state.requests_total.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let method = request.method().clone();
    let upstream_url = match request.uri().path_and_query() {
        Some(pq) => format!("{}{}", state.upstream_url.trim_end_matches('/'), pq),
        None => state.upstream_url.clone(),
    };

    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in request.headers() {
        if !is_hop_by_hop(name.as_str()) && *name != HOST && *name != USER_ID_HEADER {
            headers.insert(name.clone(), value.clone());
        }
    }
    if let Some(value) = user.and_then(|u| HeaderValue::from_str(&u.id.to_string()).ok()) {
        headers.insert(USER_ID_HEADER, value);
    }

    let body = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            state.failed("body");
            error!(error = %e, "failed to read request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {e}"),
                &request_id,
            );
        }
    };

    let upstream = state
        .client
        .request(method.clone(), &upstream_url)
        .headers(headers)
        .timeout(state.timeout)
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            state.failed("timeout");
            error!(error = %e, "upstream timeout");
            return error_response(
                StatusCode::GATEWAY_TIMEOUT,
                &format!("upstream timeout after {}s", state.timeout.as_secs()),
                &request_id,
            );
        }
        Err(e) => {
            state.failed("connection");
            error!(error = %e, "upstream request failed");
            return error_response(
                StatusCode::BAD_GATEWAY,
                &format!("upstream error: {e}"),
                &request_id,
            );
        }
    };

    let status = upstream.status();
    let mut response = Response::builder().status(status);
    for (name, value) in upstream.headers() {
        if !is_hop_by_hop(name.as_str()) {
            response = response.header(name, value);
        }
    }
    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            state.failed("body");
            error!(error = %e, "failed to read upstream response body");
            return error_response(
                StatusCode::BAD_GATEWAY,
                &format!("upstream response read error: {e}"),
                &request_id,
            );
        }
    };

    record_upstream(
        status.as_u16(),
        method.as_str(),
        started.elapsed().as_secs_f64(),
    );
    response.body(Body::from(bytes)).unwrap_or_else(|e| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("response build error: {e}"),
            &request_id,
        )
    })
}

/// Check if a header is hop-by-hop (should be stripped before forwarding)
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_detection() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("TRANSFER-ENCODING"));
        assert!(is_hop_by_hop("Proxy-Authorization"));
        assert!(!is_hop_by_hop("Content-Type"));
        assert!(!is_hop_by_hop("Cookie"));
    }

    #[test]
    fn error_response_is_json() {
        let resp = error_response(StatusCode::BAD_GATEWAY, "upstream error", "req_abc");
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(resp.headers()[CONTENT_TYPE], "application/json");
    }
}
