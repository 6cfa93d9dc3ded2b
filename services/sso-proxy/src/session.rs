//! In-memory cookie sessions
//!
//! Session mode needs a session store attached to every request. Sessions
//! live in process memory keyed by a random id in the `sso_session` cookie;
//! they do not survive a restart and are not shared between replicas.
//! A session is only registered, and its cookie only issued, once a request
//! has written something to it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use sso::{MemorySession, Session};
use tracing::debug;

pub const COOKIE_NAME: &str = "sso_session";

/// Sessions idle longer than this are dropped.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

struct Entry {
    session: Session,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct Sessions {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    idle_timeout: Duration,
}

impl Sessions {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: Arc::default(),
            idle_timeout,
        }
    }

    /// Existing live session for `id`, touching it.
    fn get(&self, id: &str) -> Option<Session> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get_mut(id)?;
        if entry.last_seen.elapsed() > self.idle_timeout {
            entries.remove(id);
            return None;
        }
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    /// Register `session` under a fresh id, purging expired ones.
    fn register(&self, session: Session) -> String {
        let id = uuid::Uuid::new_v4().as_simple().to_string();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let idle_timeout = self.idle_timeout;
        entries.retain(|_, entry| entry.last_seen.elapsed() <= idle_timeout);
        entries.insert(
            id.clone(),
            Entry {
                session,
                last_seen: Instant::now(),
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new(IDLE_TIMEOUT)
    }
}

/// Middleware: attach the caller's [`Session`], issuing a cookie once a new
/// one has been written to.
pub async fn attach_session(
    State(sessions): State<Sessions>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> (CookieJar, Response) {
    let existing = jar
        .get(COOKIE_NAME)
        .and_then(|cookie| sessions.get(cookie.value()));

    if let Some(session) = existing {
        request.extensions_mut().insert(session);
        return (jar, next.run(request).await);
    }

    let store = Arc::new(MemorySession::new());
    request
        .extensions_mut()
        .insert(Session::from_arc(store.clone()));
    let response = next.run(request).await;
    if store.is_empty() {
        return (jar, response);
    }

    let id = sessions.register(Session::from_arc(store));
    debug!(sessions = sessions.len(), "new session");
    let cookie = Cookie::build((COOKIE_NAME, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (jar.add(cookie), response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(sessions: Sessions) -> Router {
        Router::new()
            .route(
                "/",
                get(|axum::Extension(session): axum::Extension<Session>| async move {
                    let visits = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                    session.insert("visits", Value::from(visits));
                    visits.to_string()
                }),
            )
            .layer(axum::middleware::from_fn_with_state(sessions, attach_session))
    }

    async fn visit(app: &Router, cookie: Option<&str>) -> (String, Option<String>) {
        let mut request = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        (String::from_utf8(body.to_vec()).unwrap(), set_cookie)
    }

    #[tokio::test]
    async fn cookie_carries_session_between_requests() {
        let sessions = Sessions::default();
        let app = app(sessions.clone());

        let (body, set_cookie) = visit(&app, None).await;
        assert_eq!(body, "1");
        let set_cookie = set_cookie.expect("new session sets a cookie");
        assert!(set_cookie.contains("HttpOnly"));
        let pair = set_cookie.split(';').next().unwrap().to_string();

        let (body, set_cookie) = visit(&app, Some(&pair)).await;
        assert_eq!(body, "2");
        assert!(set_cookie.is_none());
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn unknown_cookie_starts_fresh_session() {
        let app = app(Sessions::default());
        let (body, set_cookie) = visit(&app, Some("sso_session=forged")).await;
        assert_eq!(body, "1");
        assert!(set_cookie.is_some());
    }

    #[tokio::test]
    async fn untouched_sessions_are_not_kept() {
        let sessions = Sessions::default();
        let app = Router::new()
            .route("/", get(|| async { "anonymous" }))
            .layer(axum::middleware::from_fn_with_state(
                sessions.clone(),
                attach_session,
            ));

        for _ in 0..50 {
            let (body, set_cookie) = visit(&app, None).await;
            assert_eq!(body, "anonymous");
            assert!(set_cookie.is_none());
        }
        assert_eq!(sessions.len(), 0);
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let sessions = Sessions::new(Duration::ZERO);
        let app = app(sessions.clone());
        let (_, set_cookie) = visit(&app, None).await;
        let pair = set_cookie.unwrap().split(';').next().unwrap().to_string();

        std::thread::sleep(Duration::from_millis(5));
        let (body, set_cookie) = visit(&app, Some(&pair)).await;
        assert_eq!(body, "1");
        assert!(set_cookie.is_some());
    }
}
