//! Cookie-backed sessions
//!
//! The host's session middleware attaches a [`Session`] to each request.
//! Authentication is the presence of the user id key; resuming redirects the
//! browser to its original URL so the next request arrives with the session
//! cookie and passes straight through.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use identity::RemoteUser;
use serde_json::Value;
use tracing::warn;

use super::{ResumeFuture, SessionStrategy, redirect_to_origin};
use crate::error::SessionError;
use crate::gateway::App;
use crate::session::Session;

/// Default session key holding the authenticated user id.
pub const DEFAULT_USER_ID_KEY: &str = "user_id";

/// Session keys consulted for the CSRF placeholder, in order.
const CSRF_KEYS: &[&str] = &["csrf", "_csrf_token"];

/// Request extension telling [`CurrentUser`](crate::CurrentUser) which
/// session key holds the user id.
#[derive(Debug, Clone)]
pub struct SessionUserKey(pub Arc<str>);

pub struct CookieSession {
    user_id_key: Arc<str>,
}

impl CookieSession {
    pub fn new(user_id_key: impl Into<Arc<str>>) -> Self {
        Self {
            user_id_key: user_id_key.into(),
        }
    }

    fn session<'r>(&self, request: &'r Request<Body>) -> Option<&'r Session> {
        request.extensions().get::<Session>()
    }
}

impl Default for CookieSession {
    fn default() -> Self {
        Self::new(DEFAULT_USER_ID_KEY)
    }
}

impl SessionStrategy for CookieSession {
    fn name(&self) -> &'static str {
        "session"
    }

    fn is_authenticated(&self, request: &Request<Body>) -> bool {
        match self.session(request) {
            Some(session) => session.contains(&self.user_id_key),
            None => {
                warn!("no session attached to request; is the session middleware installed?");
                false
            }
        }
    }

    fn remember(&self, request: &mut Request<Body>, user: &RemoteUser) -> Result<(), SessionError> {
        let session = self
            .session(request)
            .ok_or(SessionError::MissingSessionStore)?;
        session.insert(&self.user_id_key, Value::from(user.id.clone()));
        Ok(())
    }

    fn resume<'a>(&'a self, request: Request<Body>, _app: App) -> ResumeFuture<'a> {
        let response = redirect_to_origin(&request);
        Box::pin(async move { response })
    }

    fn authenticity_token(&self, request: &Request<Body>) -> Option<String> {
        let session = self.session(request)?;
        CSRF_KEYS.iter().find_map(|key| match session.get(key)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        })
    }

    fn before_pass(&self, request: &mut Request<Body>) {
        request
            .extensions_mut()
            .insert(SessionUserKey(self.user_id_key.clone()));
    }
}
