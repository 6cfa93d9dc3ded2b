//! Remote identity lookup for the SSO gateway
//!
//! Exchanges an opaque SSO token for a user record by calling the identity
//! API (`GET {endpoint}/users?access_token={token}`). The gateway never
//! issues credentials itself: it forwards the token and interprets the
//! response. Failures are classified into an HTTP status the gateway can
//! hand straight back to the browser.

pub mod client;
pub mod constants;
pub mod error;
pub mod user;

pub use client::IdentityClient;
pub use constants::*;
pub use error::{ExchangeError, Result, classify_status};
pub use user::{RemoteUser, UserId};
