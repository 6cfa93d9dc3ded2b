//! Handler-side access to the authenticated user

use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::StatusCode;
use axum::http::request::Parts;
use identity::{RemoteUser, UserId};

use crate::session::Session;
use crate::strategy::{DEFAULT_USER_ID_KEY, SessionUserKey};

/// User the gateway let through.
///
/// Resolved from the `RemoteUser` the single-page and test strategies attach
/// to the request, or from the user id the session strategy stored. In the
/// session case only the id is known. Returns `401 Unauthorized` when
/// neither is present.
///
/// ```rust,ignore
/// async fn dashboard(user: CurrentUser) -> String {
///     format!("signed in as {}", user.id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub user: Option<RemoteUser>,
}

impl CurrentUser {
    fn resolve(parts: &Parts) -> Option<Self> {
        if let Some(user) = parts.extensions.get::<RemoteUser>() {
            return Some(Self {
                id: user.id.clone(),
                user: Some(user.clone()),
            });
        }

        let session = parts.extensions.get::<Session>()?;
        let key = parts
            .extensions
            .get::<SessionUserKey>()
            .map(|k| k.0.as_ref())
            .unwrap_or(DEFAULT_USER_ID_KEY);
        let id = UserId::try_from(&session.get(key)?).ok()?;
        Some(Self { id, user: None })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::resolve(parts).ok_or(StatusCode::UNAUTHORIZED)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(Self::resolve(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn whoami(user: Option<CurrentUser>) -> String {
        match user {
            Some(u) => format!("{}:{}", u.id, u.user.map(|u| u.login).unwrap_or_default()),
            None => "anonymous".into(),
        }
    }

    async fn call(request: Request<Body>) -> (StatusCode, String) {
        let app = Router::new()
            .route("/", get(whoami))
            .route("/strict", get(|user: CurrentUser| async move { user.id.to_string() }));
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn resolves_attached_user() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(RemoteUser::new(UserId::Number(3), "bob"));
        assert_eq!(call(request).await, (StatusCode::OK, "3:bob".into()));
    }

    #[tokio::test]
    async fn resolves_session_user_id_with_custom_key() {
        let session = Session::new(MemorySession::new());
        session.insert("uid", Value::from(9));
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request.extensions_mut().insert(session);
        request
            .extensions_mut()
            .insert(SessionUserKey(Arc::from("uid")));
        assert_eq!(call(request).await, (StatusCode::OK, "9:".into()));
    }

    #[tokio::test]
    async fn missing_user_is_optional_or_unauthorized() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(call(request).await, (StatusCode::OK, "anonymous".into()));

        let request = Request::builder().uri("/strict").body(Body::empty()).unwrap();
        assert_eq!(call(request).await.0, StatusCode::UNAUTHORIZED);
    }
}
