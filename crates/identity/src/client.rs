//! User lookup against the identity API
//!
//! One blocking-per-request call: `GET {endpoint}/users?access_token={token}`
//! with `Accept` set to the configured media type. The body must be
//! `{"user": {...}}`; the token is merged into the returned record.
//! There is no retry policy. A failed lookup fails the request outright.

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::constants::{DEFAULT_ACCEPT, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::error::{ExchangeError, Result};
use crate::user::RemoteUser;

/// Envelope returned by the `/users` endpoint.
#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: RemoteUser,
}

/// HTTP client bound to one identity endpoint.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    endpoint: String,
    accept: String,
}

impl IdentityClient {
    /// Build a client for `endpoint`.
    ///
    /// `ssl_verify = false` disables certificate verification for `https`
    /// endpoints (self-signed staging setups). `timeout` bounds the whole
    /// lookup, connect included.
    pub fn new(
        endpoint: impl Into<String>,
        accept: impl Into<String>,
        ssl_verify: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!ssl_verify)
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Client(e.to_string()))?;
        Ok(Self::with_http_client(http, endpoint, accept))
    }

    /// Wrap an already configured `reqwest::Client`.
    pub fn with_http_client(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        accept: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            accept: accept.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn accept(&self) -> &str {
        &self.accept
    }

    /// Exchange an SSO token for the user it belongs to.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn exchange(&self, token: &str) -> Result<RemoteUser> {
        let response = self
            .http
            .get(format!("{}/users", self.endpoint))
            .query(&[("access_token", token)])
            .header(ACCEPT, &self.accept)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(ExchangeError::Status { status, body });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::Transport(e.without_url().to_string()))?;
        let envelope: UserEnvelope =
            serde_json::from_slice(&body).map_err(|e| ExchangeError::Decode(e.to_string()))?;

        let user = envelope.user.with_token(token);
        debug!(login = %user.login, "token exchanged");
        Ok(user)
    }
}

impl Default for IdentityClient {
    fn default() -> Self {
        Self::with_http_client(
            reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            DEFAULT_ENDPOINT,
            DEFAULT_ACCEPT,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::UserId;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use tokio::net::TcpListener;

    /// Start a stand-in identity API. `/users` echoes the query and Accept
    /// header back inside the user record so tests can assert on them.
    async fn start_identity_api(status: StatusCode, body: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let app = axum::Router::new().route(
                "/users",
                axum::routing::get(move |uri: Uri, headers: HeaderMap| async move {
                    let payload = match body {
                        Some(b) => b.to_string(),
                        None => serde_json::json!({
                            "user": {
                                "id": 1,
                                "login": "bob",
                                "query": uri.query().unwrap_or(""),
                                "accept": headers
                                    .get("accept")
                                    .and_then(|v| v.to_str().ok())
                                    .unwrap_or(""),
                            }
                        })
                        .to_string(),
                    };
                    (status, payload)
                }),
            );
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}")
    }

    fn client(endpoint: &str) -> IdentityClient {
        IdentityClient::new(endpoint, DEFAULT_ACCEPT, true, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn exchange_merges_token_into_user() {
        let endpoint = start_identity_api(StatusCode::OK, None).await;
        let user = client(&endpoint).exchange("abc123").await.unwrap();

        assert_eq!(user.id, UserId::Number(1));
        assert_eq!(user.login, "bob");
        assert_eq!(user.token, "abc123");
        assert_eq!(user.attributes["query"], "access_token=abc123");
        assert_eq!(user.attributes["accept"], DEFAULT_ACCEPT);
    }

    #[tokio::test]
    async fn trailing_slash_on_endpoint_is_ignored() {
        let endpoint = start_identity_api(StatusCode::OK, None).await;
        let user = client(&format!("{endpoint}/"))
            .exchange("abc123")
            .await
            .unwrap();
        assert_eq!(user.login, "bob");
    }

    #[tokio::test]
    async fn not_found_is_classified_as_404() {
        let endpoint =
            start_identity_api(StatusCode::NOT_FOUND, Some(r#"{"error":"not found"}"#)).await;
        let err = client(&endpoint).exchange("stale").await.unwrap_err();

        assert!(matches!(err, ExchangeError::Status { .. }), "got: {err:?}");
        assert_eq!(err.status(), 404);
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn missing_user_envelope_is_decode_error() {
        let endpoint = start_identity_api(StatusCode::OK, Some(r#"{"users":[]}"#)).await;
        let err = client(&endpoint).exchange("abc123").await.unwrap_err();

        assert!(matches!(err, ExchangeError::Decode(_)), "got: {err:?}");
        assert_eq!(err.status(), 403);
    }

    #[tokio::test]
    async fn non_json_body_is_decode_error() {
        let endpoint = start_identity_api(StatusCode::OK, Some("<html>oops</html>")).await;
        let err = client(&endpoint).exchange("abc123").await.unwrap_err();
        assert!(matches!(err, ExchangeError::Decode(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let err = client("http://127.0.0.1:1")
            .exchange("abc123")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(_)), "got: {err:?}");
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn default_client_targets_public_api() {
        let client = IdentityClient::default();
        assert_eq!(client.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(client.accept(), DEFAULT_ACCEPT);
    }
}
