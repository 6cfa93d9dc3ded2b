//! OTP parameters
//!
//! The hardware token length bounds are kept exactly as deployed clients
//! expect them, not derived from the Yubico OTP format.

/// Digits in a TOTP code
pub const TOTP_DIGITS: usize = 6;

/// TOTP time step in seconds
pub const TOTP_STEP: u64 = 30;

/// Accepted steps on either side of the current one
pub const TOTP_SKEW: u8 = 0;

/// Random bytes in a generated TOTP secret (160 bits)
pub const SECRET_BYTES: usize = 20;

/// Shortest string treated as a hardware token response
pub const HARDWARE_MIN_LEN: usize = 32;

/// Longest string treated as a hardware token response
pub const HARDWARE_MAX_LEN: usize = 48;

/// Leading characters of a hardware token that identify the device
pub const HARDWARE_ID_LEN: usize = 12;

/// Public Yubico validation endpoint (protocol 2.0)
pub const YUBICO_VERIFY_URL: &str = "https://api.yubico.com/wsapi/2.0/verify";
