//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The Yubico API key is loaded from the YUBICO_API_KEY env var or
//! `api_key_file`, never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use sso::{Mode, WhitelistPattern};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub sso: GatewayConfig,
}

/// Listener and upstream settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub upstream_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Gateway settings; everything except `mode` falls back to library defaults.
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_mode")]
    pub mode: Mode,
    pub endpoint: Option<String>,
    pub accept: Option<String>,
    pub ssl_verify: Option<bool>,
    pub static_dir: Option<PathBuf>,
    pub login_template: Option<PathBuf>,
    pub otp_template: Option<PathBuf>,
    pub setup_template: Option<PathBuf>,
    pub user_id_key: Option<String>,
    /// Empty means every user the identity API knows is allowed.
    #[serde(default)]
    pub allowed_logins: Vec<String>,
    #[serde(default)]
    pub whitelist: Vec<WhitelistEntry>,
    /// JSON file holding OTP secrets; enables two-factor auth when set.
    pub otp_secrets_file: Option<PathBuf>,
    pub yubico: Option<YubicoConfig>,
}

/// One whitelist entry: `{ path = ".." }`, `{ glob = ".." }` or `{ regex = ".." }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitelistEntry {
    Path(String),
    Glob(String),
    Regex(String),
}

impl WhitelistEntry {
    pub fn to_pattern(&self) -> Result<WhitelistPattern, sso::ConfigError> {
        match self {
            WhitelistEntry::Path(path) => Ok(WhitelistPattern::literal(path.as_str())),
            WhitelistEntry::Glob(glob) => WhitelistPattern::glob(glob),
            WhitelistEntry::Regex(regex) => WhitelistPattern::regex(regex),
        }
    }
}

/// Hardware token verification service
#[derive(Debug, Deserialize)]
pub struct YubicoConfig {
    pub client_id: String,
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    /// Path to a file containing the API key (alternative to YUBICO_API_KEY)
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    /// Verification endpoint override
    pub url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            endpoint: None,
            accept: None,
            ssl_verify: None,
            static_dir: None,
            login_template: None,
            otp_template: None,
            setup_template: None,
            user_id_key: None,
            allowed_logins: Vec::new(),
            whitelist: Vec::new(),
            otp_secrets_file: None,
            yubico: None,
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

fn default_mode() -> Mode {
    Mode::Session
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Yubico API key resolution order:
    /// 1. YUBICO_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.server.upstream_url.starts_with("http://")
            && !config.server.upstream_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "upstream_url must start with http:// or https://, got: {}",
                config.server.upstream_url
            )));
        }

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Callback mode needs host code; test mode is for test suites.
        if !matches!(config.sso.mode, Mode::Session | Mode::SinglePage) {
            return Err(common::Error::Config(format!(
                "mode must be session or single_page, got: {}",
                config.sso.mode
            )));
        }

        for entry in &config.sso.whitelist {
            entry
                .to_pattern()
                .map_err(|e| common::Error::Config(e.to_string()))?;
        }

        if let Some(yubico) = config.sso.yubico.as_mut() {
            if let Ok(key) = std::env::var("YUBICO_API_KEY") {
                yubico.api_key = Some(Secret::new(key));
            } else if let Some(ref key_file) = yubico.api_key_file {
                let key = std::fs::read_to_string(key_file).map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read api_key_file {}: {e}",
                        key_file.display()
                    ))
                })?;
                let key = key.trim().to_owned();
                if !key.is_empty() {
                    yubico.api_key = Some(Secret::new(key));
                }
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("sso-proxy.toml")
    }
}
