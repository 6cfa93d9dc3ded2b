//! Router outcome counters
//!
//! Recorded through the `metrics` facade; the host decides whether and how
//! they are exported.

pub const WHITELISTED: &str = "whitelisted";
pub const STATIC: &str = "static";
pub const EXCHANGE_FAILED: &str = "exchange_failed";
pub const DENIED: &str = "denied";
pub const OTP_CHALLENGE: &str = "otp_challenge";
pub const AUTHENTICATED: &str = "authenticated";
pub const LOGIN_PAGE: &str = "login_page";
pub const METHOD_NOT_ALLOWED: &str = "method_not_allowed";
pub const PASS: &str = "pass";

pub fn record(outcome: &'static str) {
    metrics::counter!("sso_requests_total", "outcome" => outcome).increment(1);
}
