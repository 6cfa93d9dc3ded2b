//! File-backed OTP secret store
//!
//! Secrets are kept in a JSON object keyed by user id and rewritten on every
//! enrollment. Access is serialized through a mutex; one proxy instance per
//! file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use common::Secret;
use sso::RemoteUser;
use tracing::{error, info};

pub struct OtpSecretFile {
    path: PathBuf,
    secrets: Mutex<HashMap<String, String>>,
}

impl OtpSecretFile {
    /// Load `path`; a missing file starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        let secrets = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("invalid OTP secrets file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read OTP secrets file {}", path.display()));
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            secrets: Mutex::new(secrets),
        })
    }

    pub fn get(&self, user: &RemoteUser) -> Option<Secret<String>> {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user.id.to_string())
            .cloned()
            .map(Secret::new)
    }

    /// Store a confirmed secret. Persistence failures are logged; the secret
    /// stays in memory so the current process keeps honoring it.
    pub fn set(&self, user: &RemoteUser, secret: Secret<String>) {
        let mut secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
        secrets.insert(user.id.to_string(), secret.expose().clone());
        match self.persist(&secrets) {
            Ok(()) => info!(login = %user.login, "OTP secret stored"),
            Err(e) => error!(login = %user.login, error = %e, "failed to persist OTP secret"),
        }
    }

    fn persist(&self, secrets: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(secrets)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}
