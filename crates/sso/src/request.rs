//! Request inspection helpers
//!
//! Parameters are only read from POST requests: the query string merged
//! with an urlencoded form body, body values winning. A form body is
//! buffered and put back so the protected application still sees it; other
//! bodies are never read here.

use std::collections::HashMap;

use axum::body::{Body, HttpBody};
use axum::extract::OriginalUri;
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{Method, Request};
use tracing::debug;

/// Largest POST body the gateway buffers while looking for parameters.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Parameters relevant to the handshake.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, String>,
}

impl Params {
    /// Read parameters from `request`, returning it with its body restored.
    ///
    /// Non-POST requests yield no parameters and are returned untouched.
    /// Only urlencoded form bodies whose size is known to be at most
    /// [`MAX_BODY_BYTES`] are buffered; any other POST keeps its body
    /// stream and contributes query parameters only.
    pub async fn extract(
        request: Request<Body>,
    ) -> Result<(Request<Body>, Params), axum::Error> {
        if request.method() != Method::POST {
            return Ok((request, Params::default()));
        }

        let mut params = Params::from_query(request.uri().query());
        let is_form = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return Ok((request, params));
        }

        let declared = HttpBody::size_hint(request.body()).upper();
        match declared {
            Some(len) if len <= MAX_BODY_BYTES as u64 => {}
            _ => {
                debug!(
                    size = ?declared,
                    limit = MAX_BODY_BYTES,
                    "Form body too large or unsized, not parsed"
                );
                return Ok((request, params));
            }
        }

        let (parts, body) = request.into_parts();
        let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES).await?;
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes) {
            Ok(form) => params.values.extend(form),
            Err(e) => debug!(error = %e, "Malformed form body, ignoring its parameters"),
        }
        Ok((Request::from_parts(parts, Body::from(bytes)), params))
    }

    fn from_query(query: Option<&str>) -> Self {
        let values = query
            .map(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).unwrap_or_default())
            .unwrap_or_default()
            .into_iter()
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// `sso_token` if present (even empty), else `token` when a `user`
    /// parameter accompanies it.
    pub fn sso_token(&self) -> Option<&str> {
        self.get("sso_token").or_else(|| {
            if self.contains("user") {
                self.get("token")
            } else {
                None
            }
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// `Host` header (or URI authority) including any port.
fn authority<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}

/// Host name without port.
pub fn host<B>(request: &Request<B>) -> String {
    let authority = authority(request);
    if authority.starts_with('[') {
        // IPv6 literal: keep the brackets, drop a trailing port
        return match authority.find(']') {
            Some(end) => authority[..=end].to_string(),
            None => authority,
        };
    }
    match authority.rsplit_once(':') {
        Some((h, port)) if port.bytes().all(|b| b.is_ascii_digit()) => h.to_string(),
        _ => authority,
    }
}

/// Path prefix the gateway is mounted under, taken from axum's
/// `OriginalUri` when the router nested us.
pub fn script_name<B>(request: &Request<B>) -> String {
    let Some(OriginalUri(original)) = request.extensions().get::<OriginalUri>() else {
        return String::new();
    };
    original
        .path()
        .strip_suffix(request.uri().path())
        .unwrap_or("")
        .to_string()
}

/// Full URL the browser requested, used as the login form target and the
/// redirect location after a successful handshake.
pub fn request_url<B>(request: &Request<B>) -> String {
    let scheme = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());

    let path_and_query = match request.extensions().get::<OriginalUri>() {
        Some(OriginalUri(original)) => original
            .path_and_query()
            .map(|pq| pq.as_str().to_string()),
        None => request.uri().path_and_query().map(|pq| pq.as_str().to_string()),
    }
    .unwrap_or_else(|| "/".to_string());

    format!("{scheme}://{}{path_and_query}", authority(request))
}
