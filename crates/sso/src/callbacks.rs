//! Host-supplied hooks
//!
//! Every hook is optional at the type level; [`SsoConfig::build`] enforces
//! which ones a mode requires:
//! - callback mode needs `pass`, `set_user` and `authenticated`
//! - two-factor needs both `get_otp_secret` and `set_otp_secret`, or neither
//!
//! In the other modes `pass` / `set_user` / `authenticated` override the
//! strategy's own behavior one operation at a time.
//!
//! [`SsoConfig::build`]: crate::SsoConfig::build

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use common::Secret;
use identity::RemoteUser;

pub type PassFn = Arc<dyn Fn(&Request<Body>) -> Response + Send + Sync>;
pub type SetUserFn = Arc<dyn Fn(&mut Request<Body>, &RemoteUser) + Send + Sync>;
pub type AuthenticatedFn = Arc<dyn Fn(&Request<Body>) -> bool + Send + Sync>;
pub type AuthorizedFn = Arc<dyn Fn(&RemoteUser) -> bool + Send + Sync>;
pub type WhitelistedFn = Arc<dyn Fn(&Request<Body>) -> bool + Send + Sync>;
pub type GetOtpSecretFn = Arc<dyn Fn(&RemoteUser) -> Option<Secret<String>> + Send + Sync>;
pub type SetOtpSecretFn = Arc<dyn Fn(&RemoteUser, Secret<String>) + Send + Sync>;
/// Receives the request head only; the body is still in flight.
pub type DescribeOtpFn = Arc<dyn Fn(&Request<()>, &RemoteUser) -> String + Send + Sync>;
pub type GenerateOtpSecretFn = Arc<dyn Fn(&RemoteUser) -> String + Send + Sync>;

/// Named capability functions, resolved once at construction.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub pass: Option<PassFn>,
    pub set_user: Option<SetUserFn>,
    pub authenticated: Option<AuthenticatedFn>,
    /// Default: every user is authorized
    pub authorized: Option<AuthorizedFn>,
    /// Replaces the whitelist pattern check entirely
    pub whitelisted: Option<WhitelistedFn>,
    pub get_otp_secret: Option<GetOtpSecretFn>,
    pub set_otp_secret: Option<SetOtpSecretFn>,
    /// Default: `"{host}: {login}"`
    pub describe_otp: Option<DescribeOtpFn>,
    /// Default: 160 random bits, base32
    pub generate_otp_secret: Option<GenerateOtpSecretFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(mut self, f: impl Fn(&Request<Body>) -> Response + Send + Sync + 'static) -> Self {
        self.pass = Some(Arc::new(f));
        self
    }

    pub fn set_user(
        mut self,
        f: impl Fn(&mut Request<Body>, &RemoteUser) + Send + Sync + 'static,
    ) -> Self {
        self.set_user = Some(Arc::new(f));
        self
    }

    pub fn authenticated(
        mut self,
        f: impl Fn(&Request<Body>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.authenticated = Some(Arc::new(f));
        self
    }

    pub fn authorized(mut self, f: impl Fn(&RemoteUser) -> bool + Send + Sync + 'static) -> Self {
        self.authorized = Some(Arc::new(f));
        self
    }

    pub fn whitelisted(
        mut self,
        f: impl Fn(&Request<Body>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.whitelisted = Some(Arc::new(f));
        self
    }

    pub fn get_otp_secret(
        mut self,
        f: impl Fn(&RemoteUser) -> Option<Secret<String>> + Send + Sync + 'static,
    ) -> Self {
        self.get_otp_secret = Some(Arc::new(f));
        self
    }

    pub fn set_otp_secret(
        mut self,
        f: impl Fn(&RemoteUser, Secret<String>) + Send + Sync + 'static,
    ) -> Self {
        self.set_otp_secret = Some(Arc::new(f));
        self
    }

    pub fn describe_otp(
        mut self,
        f: impl Fn(&Request<()>, &RemoteUser) -> String + Send + Sync + 'static,
    ) -> Self {
        self.describe_otp = Some(Arc::new(f));
        self
    }

    pub fn generate_otp_secret(
        mut self,
        f: impl Fn(&RemoteUser) -> String + Send + Sync + 'static,
    ) -> Self {
        self.generate_otp_secret = Some(Arc::new(f));
        self
    }

    /// Whether any of `pass` / `set_user` / `authenticated` was supplied.
    pub(crate) fn has_strategy_overrides(&self) -> bool {
        self.pass.is_some() || self.set_user.is_some() || self.authenticated.is_some()
    }
}
