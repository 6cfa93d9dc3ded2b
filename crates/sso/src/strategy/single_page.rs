//! Stateless single-request mode
//!
//! For hosts without a session store. The resolved user is attached to the
//! request and the protected app is re-invoked in-process, so it sees the
//! identity immediately. Nothing survives the request: the next request
//! starts unauthenticated.

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Request};
use identity::RemoteUser;
use tower::ServiceExt;

use super::{ResumeFuture, SessionStrategy};
use crate::error::SessionError;
use crate::gateway::App;

#[derive(Debug, Default)]
pub struct SinglePage;

impl SinglePage {
    pub fn new() -> Self {
        Self
    }
}

/// Turn the handshake POST into a body-less GET, keeping headers and
/// extensions (including the attached user).
fn sanitize(request: Request<Body>) -> Request<Body> {
    let (mut parts, _body) = request.into_parts();
    parts.method = Method::GET;
    parts.headers.remove(CONTENT_TYPE);
    parts
        .headers
        .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    Request::from_parts(parts, Body::empty())
}

impl SessionStrategy for SinglePage {
    fn name(&self) -> &'static str {
        "single_page"
    }

    fn is_authenticated(&self, request: &Request<Body>) -> bool {
        request.extensions().get::<RemoteUser>().is_some()
    }

    fn remember(&self, request: &mut Request<Body>, user: &RemoteUser) -> Result<(), SessionError> {
        request.extensions_mut().insert(user.clone());
        Ok(())
    }

    fn resume<'a>(&'a self, request: Request<Body>, app: App) -> ResumeFuture<'a> {
        Box::pin(async move {
            match app.oneshot(sanitize(request)).await {
                Ok(response) => response,
                Err(never) => match never {},
            }
        })
    }
}
