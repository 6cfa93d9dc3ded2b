//! Error types for OTP operations

/// Errors from OTP operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid TOTP secret: {0}")]
    InvalidSecret(String),

    #[error("QR code generation failed: {0}")]
    Qr(String),

    #[error("hardware token verification failed: {0}")]
    Hardware(String),
}

/// Result alias for OTP operations.
pub type Result<T> = std::result::Result<T, Error>;
