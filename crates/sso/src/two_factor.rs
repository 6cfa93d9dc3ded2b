//! Second-factor verification and enrollment
//!
//! Runs after the identity exchange succeeded and the user is authorized.
//! Users with a stored secret must present a current TOTP code or an
//! accepted hardware token; users without one are walked through setup.
//! Every failure is a challenge page, never an error.

use std::sync::Arc;

use axum::http::Request;
use common::Secret;
use identity::RemoteUser;
use otp::{HARDWARE_ID_LEN, HardwareVerifier, OtpInput, Totp};
use tracing::{debug, info, warn};

use crate::callbacks::{DescribeOtpFn, GenerateOtpSecretFn, GetOtpSecretFn, SetOtpSecretFn};
use crate::request::{Params, host};

/// What the router should do after the second-factor check.
#[derive(Debug)]
pub enum OtpDecision {
    /// Verified (or two-factor disabled); continue to remember/resume.
    Proceed,
    Challenge(Challenge),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Challenge {
    /// Enrolled user must enter a code.
    OtpPage,
    /// Enrollment in progress with a pending secret.
    SetupPage {
        secret: String,
        otp_url: String,
        qr_img: String,
    },
}

/// Enabled two-factor configuration.
pub struct TwoFactor {
    get_secret: GetOtpSecretFn,
    set_secret: SetOtpSecretFn,
    describe: Option<DescribeOtpFn>,
    generate: Option<GenerateOtpSecretFn>,
    hardware: Option<Arc<dyn HardwareVerifier>>,
}

impl TwoFactor {
    pub fn new(get_secret: GetOtpSecretFn, set_secret: SetOtpSecretFn) -> Self {
        Self {
            get_secret,
            set_secret,
            describe: None,
            generate: None,
            hardware: None,
        }
    }

    pub fn with_describe(mut self, describe: Option<DescribeOtpFn>) -> Self {
        self.describe = describe;
        self
    }

    pub fn with_generate(mut self, generate: Option<GenerateOtpSecretFn>) -> Self {
        self.generate = generate;
        self
    }

    pub fn with_hardware(mut self, hardware: Option<Arc<dyn HardwareVerifier>>) -> Self {
        self.hardware = hardware;
        self
    }

    pub async fn decide(
        &self,
        request: &Request<()>,
        user: &RemoteUser,
        params: &Params,
    ) -> OtpDecision {
        let input = OtpInput::classify(params.get("otp"));
        match (self.get_secret)(user) {
            Some(secret) if !secret.is_empty() => self.verify_enrolled(user, &secret, input).await,
            _ => self.enroll(request, user, params, input).await,
        }
    }

    async fn verify_enrolled(
        &self,
        user: &RemoteUser,
        secret: &Secret<String>,
        input: OtpInput<'_>,
    ) -> OtpDecision {
        let verified = match input {
            OtpInput::Code(code) => match Totp::from_base32(secret.expose()) {
                Ok(totp) => totp.verify(code),
                Err(e) => {
                    debug!(login = %user.login, error = %e, "Stored secret is not a TOTP secret");
                    false
                }
            },
            OtpInput::Hardware(token) => {
                token.starts_with(secret.expose_str()) && self.verify_hardware(token).await
            }
            OtpInput::Missing | OtpInput::Malformed(_) => false,
        };

        if verified {
            debug!(login = %user.login, "Second factor verified");
            OtpDecision::Proceed
        } else {
            OtpDecision::Challenge(Challenge::OtpPage)
        }
    }

    async fn enroll(
        &self,
        request: &Request<()>,
        user: &RemoteUser,
        params: &Params,
        input: OtpInput<'_>,
    ) -> OtpDecision {
        let totp = self.pending_secret(user, params);

        match input {
            OtpInput::Code(code) if totp.verify(code) => {
                info!(login = %user.login, "Two-factor enrollment confirmed");
                (self.set_secret)(user, Secret::new(totp.secret_base32().to_string()));
                return OtpDecision::Proceed;
            }
            OtpInput::Hardware(token) if self.verify_hardware(token).await => {
                info!(login = %user.login, "Hardware token enrolled");
                let device: String = token.chars().take(HARDWARE_ID_LEN).collect();
                (self.set_secret)(user, Secret::new(device));
                return OtpDecision::Proceed;
            }
            _ => {}
        }

        let label = match &self.describe {
            Some(describe) => describe(request, user),
            None => format!("{}: {}", host(request), user.login),
        };
        let otp_url = totp.provisioning_uri(&label);
        let qr_img = match totp.qr_png_base64(&label) {
            Ok(png) => format!(r#"<img src="data:image/png;base64,{png}" alt="QR code">"#),
            Err(e) => {
                warn!(error = %e, "Failed to render provisioning QR code");
                String::new()
            }
        };
        OtpDecision::Challenge(Challenge::SetupPage {
            secret: totp.secret_base32().to_string(),
            otp_url,
            qr_img,
        })
    }

    /// Secret carried over from an interrupted setup, or a fresh one.
    fn pending_secret(&self, user: &RemoteUser, params: &Params) -> Totp {
        if let Some(carried) = params.get("otp_secret").filter(|s| !s.is_empty()) {
            match Totp::from_base32(carried) {
                Ok(totp) => return totp,
                Err(e) => warn!(login = %user.login, error = %e, "Ignoring invalid otp_secret"),
            }
        }
        if let Some(generate) = &self.generate {
            match Totp::from_base32(&generate(user)) {
                Ok(totp) => return totp,
                Err(e) => warn!(error = %e, "generate_otp_secret returned an invalid secret"),
            }
        }
        Totp::random()
    }

    async fn verify_hardware(&self, token: &str) -> bool {
        let Some(verifier) = &self.hardware else {
            warn!("Hardware token submitted but no verifier configured");
            return false;
        };
        match verifier.verify(token).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "Hardware token verification failed");
                false
            }
        }
    }
}
