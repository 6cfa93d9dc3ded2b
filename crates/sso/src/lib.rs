//! Single-sign-on gateway middleware
//!
//! Sits in front of a protected application as a `tower::Layer` and decides,
//! per request, whether to let it through, serve a login/OTP page, or run
//! the SSO token handshake. Evaluation order, first match wins:
//!
//! 1. Whitelisted path: pass through untouched
//! 2. Asset namespace (`/__travis__/*`): served from the static directory
//! 3. SSO token in the POST parameters: exchange it, authorize, run the
//!    second factor, then remember the user and resume the original request
//! 4. Not authenticated: login page on GET/HEAD, 405 otherwise
//! 5. Otherwise: pass through to the protected application
//!
//! How "authenticated" is remembered is delegated to a [`SessionStrategy`]
//! selected by [`Mode`]. The gateway holds no mutable state of its own;
//! session and OTP secret stores are supplied by the host and must handle
//! their own synchronization.

pub mod callbacks;
pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
mod metrics;
pub mod mode;
pub mod request;
pub mod session;
pub mod strategy;
pub mod template;
pub mod two_factor;
pub mod whitelist;

pub use callbacks::Callbacks;
pub use config::SsoConfig;
pub use error::{ConfigError, SessionError};
pub use extract::CurrentUser;
pub use gateway::{App, SsoLayer, SsoService};
pub use identity::{RemoteUser, UserId};
pub use mode::Mode;
pub use session::{MemorySession, Session, SessionStore};
pub use strategy::{SessionStrategy, TestContext};
pub use template::Templates;
pub use whitelist::{Whitelist, WhitelistPattern};
