//! Time-based one-time passwords
//!
//! Secrets travel as unpadded RFC 4648 base32 strings, the format
//! authenticator apps scan from the provisioning URI. Verification accepts
//! the current 30 second window only: a code from the previous or next
//! step is rejected.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngExt;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::constants::{SECRET_BYTES, TOTP_DIGITS, TOTP_SKEW, TOTP_STEP};
use crate::error::{Error, Result};
use crate::input::is_totp_code;

/// Generate a random base32 TOTP secret.
pub fn generate_secret() -> String {
    Totp::random().base32
}

/// A decoded TOTP secret.
#[derive(Clone)]
pub struct Totp {
    base32: String,
    bytes: Vec<u8>,
}

impl Totp {
    /// Decode a base32 secret. Whitespace, padding and lowercase are tolerated
    /// since secrets are often copied by hand from a setup page.
    pub fn from_base32(secret: &str) -> Result<Self> {
        let normalized: String = secret
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if normalized.is_empty() {
            return Err(Error::InvalidSecret("secret is empty".into()));
        }
        let bytes = Secret::Encoded(normalized.clone())
            .to_bytes()
            .map_err(|e| Error::InvalidSecret(format!("{e:?}")))?;
        Ok(Self {
            base32: normalized,
            bytes,
        })
    }

    /// A fresh random secret.
    pub fn random() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rng().fill(&mut bytes);
        let bytes = bytes.to_vec();
        Self {
            base32: Secret::Raw(bytes.clone()).to_encoded().to_string(),
            bytes,
        }
    }

    pub fn secret_base32(&self) -> &str {
        &self.base32
    }

    /// Check a code against the window containing `unix_time`.
    pub fn verify_at(&self, code: &str, unix_time: u64) -> bool {
        is_totp_code(code) && self.engine(String::new()).check(code, unix_time)
    }

    /// Check a code against the current window.
    pub fn verify(&self, code: &str) -> bool {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(now) => self.verify_at(code, now.as_secs()),
            Err(_) => false,
        }
    }

    /// Code for the window containing `unix_time`.
    pub fn generate_at(&self, unix_time: u64) -> String {
        self.engine(String::new()).generate(unix_time)
    }

    /// `otpauth://totp/...` URI an authenticator app can import.
    pub fn provisioning_uri(&self, label: &str) -> String {
        self.engine(label.to_string()).get_url()
    }

    /// Provisioning URI rendered as a base64 PNG QR code.
    pub fn qr_png_base64(&self, label: &str) -> Result<String> {
        self.engine(label.to_string())
            .get_qr_base64()
            .map_err(Error::Qr)
    }

    // Unchecked: secrets supplied during an interrupted setup may be shorter
    // than the 128 bits the checked constructor insists on.
    fn engine(&self, account_name: String) -> TOTP {
        TOTP::new_unchecked(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            self.bytes.clone(),
            None,
            account_name,
        )
    }
}
