//! Host-delegated strategies
//!
//! [`Delegated`] forwards every operation to host functions; it backs
//! callback mode, where the host owns session and identity semantics.
//! [`Overridden`] wraps a built-in strategy and replaces only the operations
//! the host supplied a function for.

use axum::body::Body;
use axum::http::Request;
use identity::RemoteUser;

use super::{ResumeFuture, SessionStrategy};
use crate::callbacks::{AuthenticatedFn, PassFn, SetUserFn};
use crate::error::SessionError;
use crate::gateway::App;

pub struct Delegated {
    pass: PassFn,
    set_user: SetUserFn,
    authenticated: AuthenticatedFn,
}

impl Delegated {
    pub fn new(pass: PassFn, set_user: SetUserFn, authenticated: AuthenticatedFn) -> Self {
        Self {
            pass,
            set_user,
            authenticated,
        }
    }
}

impl SessionStrategy for Delegated {
    fn name(&self) -> &'static str {
        "callback"
    }

    fn is_authenticated(&self, request: &Request<Body>) -> bool {
        (self.authenticated)(request)
    }

    fn remember(&self, request: &mut Request<Body>, user: &RemoteUser) -> Result<(), SessionError> {
        (self.set_user)(request, user);
        Ok(())
    }

    fn resume<'a>(&'a self, request: Request<Body>, _app: App) -> ResumeFuture<'a> {
        let response = (self.pass)(&request);
        Box::pin(async move { response })
    }
}

/// A built-in strategy with some operations replaced by host functions.
pub struct Overridden {
    inner: Box<dyn SessionStrategy>,
    pass: Option<PassFn>,
    set_user: Option<SetUserFn>,
    authenticated: Option<AuthenticatedFn>,
}

impl Overridden {
    pub fn new(
        inner: Box<dyn SessionStrategy>,
        pass: Option<PassFn>,
        set_user: Option<SetUserFn>,
        authenticated: Option<AuthenticatedFn>,
    ) -> Self {
        Self {
            inner,
            pass,
            set_user,
            authenticated,
        }
    }
}

impl SessionStrategy for Overridden {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn is_authenticated(&self, request: &Request<Body>) -> bool {
        match &self.authenticated {
            Some(f) => f(request),
            None => self.inner.is_authenticated(request),
        }
    }

    fn remember(&self, request: &mut Request<Body>, user: &RemoteUser) -> Result<(), SessionError> {
        match &self.set_user {
            Some(f) => {
                f(request, user);
                Ok(())
            }
            None => self.inner.remember(request, user),
        }
    }

    fn resume<'a>(&'a self, request: Request<Body>, app: App) -> ResumeFuture<'a> {
        match &self.pass {
            Some(f) => {
                let response = f(&request);
                Box::pin(async move { response })
            }
            None => self.inner.resume(request, app),
        }
    }

    fn authenticity_token(&self, request: &Request<Body>) -> Option<String> {
        self.inner.authenticity_token(request)
    }

    fn before_pass(&self, request: &mut Request<Body>) {
        self.inner.before_pass(request)
    }
}
