//! Gateway configuration
//!
//! Built once with [`SsoConfig::new`] and the `with_*` methods, then
//! validated by [`SsoConfig::build`]. Nothing here changes after the layer
//! exists.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use identity::{DEFAULT_ACCEPT, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, IdentityClient};
use otp::HardwareVerifier;
use tower_http::services::ServeDir;
use tracing::info;

use crate::callbacks::Callbacks;
use crate::error::ConfigError;
use crate::gateway::{Gateway, SsoLayer};
use crate::mode::Mode;
use crate::strategy::{
    CookieSession, Delegated, Overridden, SessionStrategy, SinglePage, TestContext, TestSession,
};
use crate::template::Templates;
use crate::two_factor::TwoFactor;
use crate::whitelist::{Whitelist, WhitelistPattern};

/// Path segment under which static assets are served.
pub const DEFAULT_ASSET_NAMESPACE: &str = "__travis__";

pub struct SsoConfig {
    mode: Mode,
    endpoint: String,
    accept: String,
    ssl_verify: bool,
    timeout: Duration,
    static_dir: Option<PathBuf>,
    asset_namespace: String,
    templates: Templates,
    whitelist: Vec<WhitelistPattern>,
    user_id_key: String,
    callbacks: Callbacks,
    hardware: Option<Arc<dyn HardwareVerifier>>,
    test_context: TestContext,
    identity: Option<IdentityClient>,
}

impl SsoConfig {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            ssl_verify: true,
            timeout: DEFAULT_TIMEOUT,
            static_dir: None,
            asset_namespace: DEFAULT_ASSET_NAMESPACE.to_string(),
            templates: Templates::default(),
            whitelist: Vec::new(),
            user_id_key: crate::strategy::DEFAULT_USER_ID_KEY.to_string(),
            callbacks: Callbacks::default(),
            hardware: None,
            test_context: TestContext::default(),
            identity: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    pub fn with_ssl_verify(mut self, ssl_verify: bool) -> Self {
        self.ssl_verify = ssl_verify;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory served under the asset namespace. Without one, namespace
    /// requests get 404.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn with_asset_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.asset_namespace = namespace.into().trim_matches('/').to_string();
        self
    }

    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_login_template(mut self, content: impl Into<String>) -> Self {
        self.templates.login = content.into();
        self
    }

    pub fn with_otp_template(mut self, content: impl Into<String>) -> Self {
        self.templates.otp = content.into();
        self
    }

    pub fn with_setup_template(mut self, content: impl Into<String>) -> Self {
        self.templates.setup = content.into();
        self
    }

    /// Extra whitelist entries, checked after the built-in `/favicon.ico`.
    pub fn with_whitelist(mut self, patterns: impl IntoIterator<Item = WhitelistPattern>) -> Self {
        self.whitelist.extend(patterns);
        self
    }

    /// Session key holding the user id in session mode.
    pub fn with_user_id_key(mut self, key: impl Into<String>) -> Self {
        self.user_id_key = key.into();
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_hardware_verifier(mut self, verifier: impl HardwareVerifier + 'static) -> Self {
        self.hardware = Some(Arc::new(verifier));
        self
    }

    /// Identity source for test mode.
    pub fn with_test_context(mut self, context: TestContext) -> Self {
        self.test_context = context;
        self
    }

    /// Use a prebuilt client instead of one made from endpoint/accept/ssl_verify.
    pub fn with_identity_client(mut self, client: IdentityClient) -> Self {
        self.identity = Some(client);
        self
    }

    /// Validate and produce the layer.
    pub fn build(self) -> Result<SsoLayer, ConfigError> {
        let callbacks = self.callbacks;

        let strategy: Box<dyn SessionStrategy> = match self.mode {
            Mode::Callback => {
                let pass = callbacks.pass.clone().ok_or(ConfigError::MissingCallback("pass"))?;
                let set_user = callbacks
                    .set_user
                    .clone()
                    .ok_or(ConfigError::MissingCallback("set_user"))?;
                let authenticated = callbacks
                    .authenticated
                    .clone()
                    .ok_or(ConfigError::MissingCallback("authenticated"))?;
                Box::new(Delegated::new(pass, set_user, authenticated))
            }
            mode => {
                let inner: Box<dyn SessionStrategy> = match mode {
                    Mode::SinglePage => Box::new(SinglePage::new()),
                    Mode::Test => Box::new(TestSession::new(self.test_context)),
                    _ => Box::new(CookieSession::new(self.user_id_key)),
                };
                if callbacks.has_strategy_overrides() {
                    Box::new(Overridden::new(
                        inner,
                        callbacks.pass.clone(),
                        callbacks.set_user.clone(),
                        callbacks.authenticated.clone(),
                    ))
                } else {
                    inner
                }
            }
        };

        let two_factor = match (callbacks.get_otp_secret.clone(), callbacks.set_otp_secret.clone()) {
            (Some(get), Some(set)) => Some(
                TwoFactor::new(get, set)
                    .with_describe(callbacks.describe_otp.clone())
                    .with_generate(callbacks.generate_otp_secret.clone())
                    .with_hardware(self.hardware),
            ),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTwoFactor),
        };

        let identity = match self.identity {
            Some(client) => client,
            None => IdentityClient::new(&self.endpoint, &self.accept, self.ssl_verify, self.timeout)?,
        };

        let mut templates = self.templates;
        templates.login = templates.login.replace("%endpoint%", &self.endpoint);

        info!(
            mode = %self.mode,
            strategy = strategy.name(),
            endpoint = %identity.endpoint(),
            two_factor = two_factor.is_some(),
            "SSO gateway configured"
        );

        Ok(SsoLayer::new(Gateway {
            identity,
            strategy,
            two_factor,
            whitelist: Whitelist::new(self.whitelist),
            whitelisted: callbacks.whitelisted,
            authorized: callbacks.authorized,
            templates,
            static_files: self.static_dir.map(ServeDir::new),
            namespace: self.asset_namespace,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn full_callbacks() -> Callbacks {
        Callbacks::new()
            .pass(|_req| axum::http::StatusCode::OK.into_response())
            .set_user(|_req, _user| {})
            .authenticated(|_req| false)
    }

    #[test]
    fn callback_mode_requires_all_three() {
        let err = SsoConfig::new(Mode::Callback).build().err().unwrap();
        assert!(matches!(err, ConfigError::MissingCallback("pass")));

        let callbacks = Callbacks::new().pass(|_req| axum::http::StatusCode::OK.into_response());
        let err = SsoConfig::new(Mode::Callback)
            .with_callbacks(callbacks)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingCallback("set_user")));

        assert!(
            SsoConfig::new(Mode::Callback)
                .with_callbacks(full_callbacks())
                .build()
                .is_ok()
        );
    }

    #[test]
    fn other_modes_need_no_callbacks() {
        for mode in [Mode::Session, Mode::SinglePage, Mode::Test] {
            assert!(SsoConfig::new(mode).build().is_ok(), "{mode} should build");
        }
    }

    #[test]
    fn half_configured_two_factor_is_rejected() {
        let get_only = Callbacks::new().get_otp_secret(|_user| None);
        let err = SsoConfig::new(Mode::Session)
            .with_callbacks(get_only)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::PartialTwoFactor));

        let set_only = Callbacks::new().set_otp_secret(|_user, _secret| {});
        let err = SsoConfig::new(Mode::Session)
            .with_callbacks(set_only)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::PartialTwoFactor));
    }

    #[test]
    fn namespace_is_trimmed() {
        let config = SsoConfig::new(Mode::Session).with_asset_namespace("/assets/");
        assert_eq!(config.asset_namespace, "assets");
    }

    #[test]
    fn defaults() {
        let config = SsoConfig::new(Mode::Session);
        assert_eq!(config.endpoint, "https://api.travis-ci.org");
        assert_eq!(config.accept, "application/vnd.travis-ci.2+json");
        assert!(config.ssl_verify);
        assert_eq!(config.asset_namespace, "__travis__");
        assert_eq!(config.user_id_key, "user_id");
    }
}
