//! One-time password primitives for the SSO gateway
//!
//! Two second factors are supported:
//! 1. TOTP (RFC 6238): 6 digits, 30 second step, SHA-1, current window only
//! 2. Hardware OTP (Yubikey style): 32-48 character token whose first 12
//!    characters identify the device, validated by a remote service
//!
//! The gateway decides which path applies with [`OtpInput::classify`], then
//! uses [`Totp`] or a [`HardwareVerifier`]. Enrollment state and secret
//! storage live in the gateway, not here.

pub mod constants;
pub mod error;
pub mod hardware;
pub mod input;
pub mod totp;

pub use constants::*;
pub use error::{Error, Result};
pub use hardware::{HardwareVerifier, YubicoVerifier};
pub use input::OtpInput;
pub use totp::{Totp, generate_secret};
