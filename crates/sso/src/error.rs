//! Error types for gateway construction and session access

use identity::ExchangeError;

/// Construction-time errors. The gateway never starts with one of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("callback {0} missing")]
    MissingCallback(&'static str),

    #[error("to enable two-factor auth, set both get_otp_secret and set_otp_secret")]
    PartialTwoFactor,

    #[error("invalid whitelist pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("unknown mode {0:?}, expected one of: callback, session, single_page, test")]
    UnknownMode(String),

    #[error("identity client: {0}")]
    Identity(#[from] ExchangeError),
}

/// Per-request failures of the cookie-backed session strategy.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store not available")]
    MissingSessionStore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_two_factor_message_names_both_callbacks() {
        let msg = ConfigError::PartialTwoFactor.to_string();
        assert!(msg.contains("get_otp_secret") && msg.contains("set_otp_secret"));
    }

    #[test]
    fn missing_callback_names_it() {
        assert_eq!(
            ConfigError::MissingCallback("set_user").to_string(),
            "callback set_user missing"
        );
    }
}
