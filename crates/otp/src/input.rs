//! Shape classification of a submitted `otp` parameter

use crate::constants::{HARDWARE_MAX_LEN, HARDWARE_MIN_LEN, TOTP_DIGITS};

/// What the browser sent in the `otp` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpInput<'a> {
    /// No code at all. Treated as a failed verification, never as "skip".
    Missing,
    /// Exactly six ASCII digits
    Code(&'a str),
    /// 32 to 48 characters: a hardware token response
    Hardware(&'a str),
    /// Anything else
    Malformed(&'a str),
}

impl<'a> OtpInput<'a> {
    pub fn classify(value: Option<&'a str>) -> Self {
        match value {
            None => OtpInput::Missing,
            Some(v) if is_totp_code(v) => OtpInput::Code(v),
            Some(v) if (HARDWARE_MIN_LEN..=HARDWARE_MAX_LEN).contains(&v.chars().count()) => {
                OtpInput::Hardware(v)
            }
            Some(v) => OtpInput::Malformed(v),
        }
    }
}

/// `true` for exactly six ASCII digits.
pub fn is_totp_code(value: &str) -> bool {
    value.len() == TOTP_DIGITS && value.bytes().all(|b| b.is_ascii_digit())
}
