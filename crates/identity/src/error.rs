//! Token exchange failures and their HTTP classification

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::DEFAULT_FAILURE_STATUS;

/// First `40x` status embedded in an error message.
static CLIENT_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"40\d").expect("static regex is valid"));

/// Errors from a token exchange. None of them are retried: the gateway turns
/// each one into a terminal response for the current request.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("failed to build identity client: {0}")]
    Client(String),

    #[error("identity request failed: {0}")]
    Transport(String),

    #[error("identity endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid identity response: {0}")]
    Decode(String),
}

impl ExchangeError {
    /// HTTP status to answer the browser with.
    ///
    /// Uses the first `40x` code found in the error text, falling back to
    /// 403 (access denied). A 5xx from the identity API therefore surfaces as
    /// 403 unless its body happens to mention a 40x code.
    pub fn status(&self) -> u16 {
        classify_status(&self.to_string())
    }
}

/// Extract a `40x` status from free-form error text, defaulting to 403.
pub fn classify_status(message: &str) -> u16 {
    CLIENT_STATUS
        .find(message)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_FAILURE_STATUS)
}

/// Result alias for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;
