//! Session strategies: how "authenticated" is remembered
//!
//! The router only talks to [`SessionStrategy`]; it never checks which
//! variant it holds.
//!
//! | Mode | authenticated when | remember | resume |
//! |---|---|---|---|
//! | session | session has the user id key | write user id to session | 303 to original URL |
//! | single_page | request carries a `RemoteUser` | attach user to request | re-run app as GET |
//! | callback | host function | host function | host function |
//! | test | a test identity is signed in | no-op | 303 to original URL |

mod cookie;
mod delegated;
mod single_page;
mod test;

pub use cookie::{CookieSession, DEFAULT_USER_ID_KEY, SessionUserKey};
pub use delegated::{Delegated, Overridden};
pub use single_page::SinglePage;
pub use test::{TestContext, TestSession};

use std::future::Future;
use std::pin::Pin;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use identity::RemoteUser;

use crate::error::SessionError;
use crate::gateway::App;

/// Boxed future returned by [`SessionStrategy::resume`].
pub type ResumeFuture<'a> = Pin<Box<dyn Future<Output = Response> + Send + 'a>>;

/// Polymorphic session persistence.
///
/// Uses `Pin<Box<dyn Future>>` for dyn-compatibility (`Box<dyn SessionStrategy>`).
pub trait SessionStrategy: Send + Sync {
    /// Identifier for logging (e.g. "session", "single_page")
    fn name(&self) -> &'static str;

    /// Is this request already authenticated?
    fn is_authenticated(&self, request: &Request<Body>) -> bool;

    /// Record that `user` authenticated on this request.
    fn remember(&self, request: &mut Request<Body>, user: &RemoteUser) -> Result<(), SessionError>;

    /// Produce the response that continues the original request once the
    /// handshake succeeded.
    fn resume<'a>(&'a self, request: Request<Body>, app: App) -> ResumeFuture<'a>;

    /// CSRF token for the `%csrf%` placeholder.
    fn authenticity_token(&self, _request: &Request<Body>) -> Option<String> {
        None
    }

    /// Called right before a request is handed to the protected app.
    fn before_pass(&self, _request: &mut Request<Body>) {}
}

/// 303 back to the URL the browser asked for.
pub(crate) fn redirect_to_origin(request: &Request<Body>) -> Response {
    use axum::http::StatusCode;
    use axum::http::header::{CONTENT_TYPE, LOCATION};
    use axum::response::IntoResponse;

    let location = crate::request::request_url(request);
    (
        StatusCode::SEE_OTHER,
        [(LOCATION, location.as_str()), (CONTENT_TYPE, "text/html")],
        "",
    )
        .into_response()
}
