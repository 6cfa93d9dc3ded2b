//! Fixed-identity strategy for exercising downstream code
//!
//! Not for production. Authentication is whatever identity the
//! [`TestContext`] currently holds; no token exchange is needed. The context
//! is an explicit value shared between the test and the gateway, not
//! process-wide state.

use std::sync::{Arc, RwLock};

use axum::body::Body;
use axum::http::Request;
use identity::RemoteUser;

use super::{ResumeFuture, SessionStrategy, redirect_to_origin};
use crate::error::SessionError;
use crate::gateway::App;

/// Shared handle to the signed-in test identity.
#[derive(Debug, Clone, Default)]
pub struct TestContext {
    user: Arc<RwLock<Option<RemoteUser>>>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign `user` in unless someone is already signed in.
    pub fn sign_in(&self, user: RemoteUser) {
        let mut current = self.user.write().unwrap_or_else(|e| e.into_inner());
        if current.is_none() {
            *current = Some(user);
        }
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn current(&self) -> Option<RemoteUser> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

pub struct TestSession {
    context: TestContext,
}

impl TestSession {
    pub fn new(context: TestContext) -> Self {
        Self { context }
    }
}

impl SessionStrategy for TestSession {
    fn name(&self) -> &'static str {
        "test"
    }

    fn is_authenticated(&self, _request: &Request<Body>) -> bool {
        self.context.current().is_some()
    }

    fn remember(&self, _request: &mut Request<Body>, _user: &RemoteUser) -> Result<(), SessionError> {
        Ok(())
    }

    fn resume<'a>(&'a self, request: Request<Body>, _app: App) -> ResumeFuture<'a> {
        let response = redirect_to_origin(&request);
        Box::pin(async move { response })
    }

    /// The signed-in identity rides along to the protected app.
    fn before_pass(&self, request: &mut Request<Body>) {
        if let Some(user) = self.context.current() {
            request.extensions_mut().insert(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity::UserId;

    fn request() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[test]
    fn authenticated_only_while_signed_in() {
        let context = TestContext::new();
        let strategy = TestSession::new(context.clone());
        assert!(!strategy.is_authenticated(&request()));

        context.sign_in(RemoteUser::new(UserId::Number(1), "bob"));
        assert!(strategy.is_authenticated(&request()));

        context.sign_out();
        assert!(!strategy.is_authenticated(&request()));
    }

    #[test]
    fn first_sign_in_sticks_until_sign_out() {
        let context = TestContext::new();
        context.sign_in(RemoteUser::new(UserId::Number(1), "bob"));
        context.sign_in(RemoteUser::new(UserId::Number(2), "amy"));
        assert_eq!(context.current().unwrap().login, "bob");
    }

    #[test]
    fn pass_through_carries_identity() {
        let context = TestContext::new();
        let strategy = TestSession::new(context.clone());

        let mut req = request();
        strategy.before_pass(&mut req);
        assert!(req.extensions().get::<RemoteUser>().is_none());

        context.sign_in(RemoteUser::new(UserId::Number(1), "bob"));
        let mut req = request();
        strategy.before_pass(&mut req);
        assert_eq!(req.extensions().get::<RemoteUser>().unwrap().login, "bob");
    }

    #[test]
    fn separate_contexts_are_isolated() {
        let a = TestContext::new();
        let b = TestContext::new();
        a.sign_in(RemoteUser::new(UserId::Number(1), "bob"));
        assert!(b.current().is_none());
    }
}
