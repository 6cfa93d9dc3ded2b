//! Request router
//!
//! [`SsoLayer`] wraps the protected application; every request runs the
//! pipeline described in the crate docs and yields exactly one response.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{ALLOW, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use identity::{IdentityClient, RemoteUser};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::callbacks::{AuthorizedFn, WhitelistedFn};
use crate::metrics::{self, record};
use crate::request::{Params, request_url, script_name};
use crate::strategy::SessionStrategy;
use crate::template::{Layer as Replacements, Templates, layer, render};
use crate::two_factor::{Challenge, OtpDecision, TwoFactor};
use crate::whitelist::Whitelist;

/// The protected application, type-erased.
pub type App = BoxCloneSyncService<Request<Body>, Response, Infallible>;

/// Validated, immutable gateway state. Built by [`SsoConfig::build`](crate::SsoConfig::build).
pub(crate) struct Gateway {
    pub(crate) identity: IdentityClient,
    pub(crate) strategy: Box<dyn SessionStrategy>,
    pub(crate) two_factor: Option<TwoFactor>,
    pub(crate) whitelist: Whitelist,
    pub(crate) whitelisted: Option<WhitelistedFn>,
    pub(crate) authorized: Option<AuthorizedFn>,
    pub(crate) templates: Templates,
    pub(crate) static_files: Option<ServeDir>,
    pub(crate) namespace: String,
}

impl Gateway {
    async fn handle(&self, request: Request<Body>, app: App) -> Response {
        if self.is_whitelisted(&request) {
            debug!(path = %request.uri().path(), "Whitelisted");
            record(metrics::WHITELISTED);
            return self.allow(request, app).await;
        }

        if let Some(asset) = self.asset_path(request.uri()) {
            debug!(path = %request.uri().path(), "Static asset");
            record(metrics::STATIC);
            return self.serve_static(request, asset).await;
        }

        let (request, params) = match Params::extract(request).await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!(error = %e, "Failed to read request body");
                return (StatusCode::BAD_REQUEST, "unreadable request body").into_response();
            }
        };

        if let Some(token) = params.sso_token() {
            let token = token.to_string();
            return self.login(request, &token, &params, app).await;
        }

        if !self.strategy.is_authenticated(&request) {
            return self.handshake(&request);
        }

        debug!(path = %request.uri().path(), "Authenticated, passing through");
        record(metrics::PASS);
        self.allow(request, app).await
    }

    fn is_whitelisted(&self, request: &Request<Body>) -> bool {
        match &self.whitelisted {
            Some(hook) => hook(request),
            None => self.whitelist.matches(request.uri().path()),
        }
    }

    fn is_authorized(&self, user: &RemoteUser) -> bool {
        self.authorized.as_ref().is_none_or(|hook| hook(user))
    }

    /// Path and query below the asset namespace, if the request is for one.
    fn asset_path(&self, uri: &Uri) -> Option<String> {
        let path = uri.path();
        let rest = path
            .strip_prefix('/')
            .unwrap_or(path)
            .strip_prefix(self.namespace.as_str())?;
        if !rest.starts_with('/') {
            return None;
        }
        Some(match uri.query() {
            Some(query) => format!("{rest}?{query}"),
            None => rest.to_string(),
        })
    }

    async fn serve_static(&self, mut request: Request<Body>, asset: String) -> Response {
        let Some(files) = &self.static_files else {
            return StatusCode::NOT_FOUND.into_response();
        };
        match asset.parse::<Uri>() {
            Ok(uri) => *request.uri_mut() = uri,
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        }
        match files.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        }
    }

    async fn allow(&self, mut request: Request<Body>, app: App) -> Response {
        self.strategy.before_pass(&mut request);
        match app.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    async fn login(
        &self,
        mut request: Request<Body>,
        token: &str,
        params: &Params,
        app: App,
    ) -> Response {
        let user = match self.identity.exchange(token).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "SSO token exchange failed");
                record(metrics::EXCHANGE_FAILED);
                let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::FORBIDDEN);
                return (status, [(CONTENT_TYPE, "text/plain")], e.to_string()).into_response();
            }
        };

        if !self.is_authorized(&user) {
            info!(login = %user.login, "Access denied");
            record(metrics::DENIED);
            return (
                StatusCode::FORBIDDEN,
                [(CONTENT_TYPE, "text/plain")],
                format!("access denied for {}", user.login),
            )
                .into_response();
        }

        if let Some(two_factor) = &self.two_factor {
            // Only the head is borrowed across the verification call.
            let (parts, body) = request.into_parts();
            let head = Request::from_parts(parts, ());
            let decision = two_factor.decide(&head, &user, params).await;
            let (parts, ()) = head.into_parts();
            request = Request::from_parts(parts, body);

            if let OtpDecision::Challenge(challenge) = decision {
                info!(login = %user.login, "Second factor required");
                record(metrics::OTP_CHALLENGE);
                return self.challenge_page(&request, &user, challenge);
            }
        }

        if let Err(e) = self.strategy.remember(&mut request, &user) {
            error!(error = %e, strategy = self.strategy.name(), "Failed to remember user");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
                .into_response();
        }

        info!(login = %user.login, strategy = self.strategy.name(), "User authenticated");
        record(metrics::AUTHENTICATED);
        self.strategy.resume(request, app).await
    }

    fn handshake(&self, request: &Request<Body>) -> Response {
        if request.method() == Method::GET || request.method() == Method::HEAD {
            debug!(path = %request.uri().path(), "Not authenticated, serving login page");
            record(metrics::LOGIN_PAGE);
            return self.page(request, &self.templates.login, Vec::new());
        }

        debug!(method = %request.method(), "Not authenticated, refusing non-GET request");
        record(metrics::METHOD_NOT_ALLOWED);
        let url = request_url(request);
        (
            StatusCode::METHOD_NOT_ALLOWED,
            [(ALLOW, "GET, HEAD"), (CONTENT_TYPE, "text/html")],
            format!("must be <a href='{url}'>GET</a> request"),
        )
            .into_response()
    }

    fn challenge_page(
        &self,
        request: &Request<Body>,
        user: &RemoteUser,
        challenge: Challenge,
    ) -> Response {
        let fields = user.field_pairs();
        match challenge {
            Challenge::OtpPage => self.page(request, &self.templates.otp, vec![fields]),
            Challenge::SetupPage {
                secret,
                otp_url,
                qr_img,
            } => {
                let setup = layer([
                    ("otp_secret", secret.as_str()),
                    ("otp_url", otp_url.as_str()),
                    ("qr_img", qr_img.as_str()),
                ]);
                self.page(request, &self.templates.setup, vec![fields, setup])
            }
        }
    }

    /// Fill `content` with csrf, public and origin, then `extra` in order.
    fn page(&self, request: &Request<Body>, content: &str, extra: Vec<Replacements>) -> Response {
        let csrf = self.strategy.authenticity_token(request).unwrap_or_default();
        let public = format!("{}/{}", script_name(request), self.namespace);
        let origin = request_url(request);

        let mut layers = vec![
            layer([("csrf", csrf.as_str())]),
            layer([("public", public.as_str()), ("origin", origin.as_str())]),
        ];
        layers.extend(extra);
        Html(render(content, &layers)).into_response()
    }
}

/// `tower::Layer` that puts the gateway in front of an application.
#[derive(Clone)]
pub struct SsoLayer {
    gateway: Arc<Gateway>,
}

impl SsoLayer {
    pub(crate) fn new(gateway: Gateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}

impl<S> Layer<S> for SsoLayer
where
    S: Service<Request<Body>, Response = Response, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    type Service = SsoService;

    fn layer(&self, inner: S) -> Self::Service {
        SsoService {
            gateway: self.gateway.clone(),
            app: BoxCloneSyncService::new(inner),
        }
    }
}

/// The gateway wrapped around one protected application.
#[derive(Clone)]
pub struct SsoService {
    gateway: Arc<Gateway>,
    app: App,
}

impl Service<Request<Body>> for SsoService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The app is driven through `oneshot`, which waits for readiness itself.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let gateway = self.gateway.clone();
        let app = self.app.clone();
        Box::pin(async move { Ok(gateway.handle(request, app).await) })
    }
}
