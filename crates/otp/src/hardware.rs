//! Hardware OTP validation
//!
//! A hardware token response is only trusted after a validation service
//! confirms it. [`YubicoVerifier`] speaks the Yubico validation protocol
//! 2.0: `GET {url}?id=..&nonce=..&otp=..[&h=..]`, answered with
//! `key=value` lines. When an API key is configured, requests are signed and
//! response signatures are checked with HMAC-SHA1.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use hmac::{Hmac, Mac};
use rand::RngExt;
use sha1::Sha1;
use tracing::{debug, instrument, warn};

use crate::constants::YUBICO_VERIFY_URL;
use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Remote confirmation of a hardware token response.
///
/// Uses `Pin<Box<dyn Future>>` so the gateway can hold an
/// `Arc<dyn HardwareVerifier>`.
pub trait HardwareVerifier: Send + Sync {
    /// `Ok(true)` only when the service accepted this exact token.
    fn verify<'a>(&'a self, otp: &'a str) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;
}

/// Client for a Yubico-compatible validation service.
pub struct YubicoVerifier {
    http: reqwest::Client,
    url: String,
    client_id: String,
    api_key: Option<Secret<String>>,
}

impl YubicoVerifier {
    /// Verifier against the public YubiCloud endpoint.
    pub fn new(client_id: impl Into<String>, api_key: Option<Secret<String>>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url: YUBICO_VERIFY_URL.to_string(),
            client_id: client_id.into(),
            api_key,
        }
    }

    /// Point at a self-hosted validation server.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn key_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.api_key
            .as_ref()
            .map(|key| {
                STANDARD
                    .decode(key.expose_str())
                    .map_err(|e| Error::Hardware(format!("api key is not base64: {e}")))
            })
            .transpose()
    }

    #[instrument(skip_all)]
    async fn check(&self, otp: &str) -> Result<bool> {
        let key = self.key_bytes()?;
        let nonce = generate_nonce();

        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("id", self.client_id.clone());
        params.insert("nonce", nonce.clone());
        params.insert("otp", otp.to_string());
        if let Some(key) = &key {
            let signature = sign(key, &params)?;
            params.insert("h", signature);
        }

        let body = self
            .http
            .get(&self.url)
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::Hardware(format!("validation request failed: {e}")))?
            .text()
            .await
            .map_err(|e| Error::Hardware(format!("validation response unreadable: {e}")))?;

        let fields = parse_response(&body);

        if let Some(key) = &key {
            let expected = fields
                .get("h")
                .ok_or_else(|| Error::Hardware("response is not signed".into()))?;
            let signed: BTreeMap<&str, String> = fields
                .iter()
                .filter(|(k, _)| k.as_str() != "h")
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect();
            if !signature_matches(key, &signed, expected)? {
                warn!("validation response signature mismatch");
                return Ok(false);
            }
        }

        if fields.get("otp").map(String::as_str) != Some(otp)
            || fields.get("nonce") != Some(&nonce)
        {
            warn!("validation response does not echo the request");
            return Ok(false);
        }

        let status = fields
            .get("status")
            .ok_or_else(|| Error::Hardware("response has no status".into()))?;
        debug!(%status, "hardware token checked");
        Ok(status == "OK")
    }
}

impl HardwareVerifier for YubicoVerifier {
    fn verify<'a>(&'a self, otp: &'a str) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(self.check(otp))
    }
}

/// 32 hex characters, inside the protocol's 16-40 character nonce range.
fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// `key=value` lines, `\r\n` or `\n` separated. Values may contain `=`.
fn parse_response(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.trim().split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn signing_input(params: &BTreeMap<&str, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Base64 HMAC-SHA1 over the alphabetically sorted `k=v&k=v` string.
pub(crate) fn sign(key: &[u8], params: &BTreeMap<&str, String>) -> Result<String> {
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| Error::Hardware(format!("bad api key: {e}")))?;
    mac.update(signing_input(params).as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn signature_matches(key: &[u8], params: &BTreeMap<&str, String>, expected: &str) -> Result<bool> {
    let Ok(expected) = STANDARD.decode(expected) else {
        return Ok(false);
    };
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| Error::Hardware(format!("bad api key: {e}")))?;
    mac.update(signing_input(params).as_bytes());
    Ok(mac.verify_slice(&expected).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use tokio::net::TcpListener;

    const TOKEN: &str = "cccccbhkevejlrjkjbuhtcrcnkkljhjnkvlbdgvfhgvj";
    const KEY: &str = "c2VjcmV0LWtleQ=="; // "secret-key"

    #[derive(Clone, Copy)]
    enum Behavior {
        Status(&'static str),
        WrongNonce,
        Signed(&'static str),
        BadSignature,
    }

    async fn start_validation_server(behavior: Behavior) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let app = axum::Router::new().route(
                "/verify",
                axum::routing::get(move |Query(q): Query<HashMap<String, String>>| async move {
                    let otp = q.get("otp").cloned().unwrap_or_default();
                    let nonce = q.get("nonce").cloned().unwrap_or_default();
                    let mut fields: BTreeMap<&str, String> = BTreeMap::new();
                    fields.insert("otp", otp);
                    fields.insert("t", "2026-10-19T10:00:00Z0123".into());
                    match behavior {
                        Behavior::Status(status) => {
                            fields.insert("nonce", nonce);
                            fields.insert("status", status.into());
                        }
                        Behavior::WrongNonce => {
                            fields.insert("nonce", "0000".into());
                            fields.insert("status", "OK".into());
                        }
                        Behavior::Signed(status) => {
                            fields.insert("nonce", nonce);
                            fields.insert("status", status.into());
                            let key = STANDARD.decode(KEY).unwrap();
                            let h = sign(&key, &fields).unwrap();
                            fields.insert("h", h);
                        }
                        Behavior::BadSignature => {
                            fields.insert("nonce", nonce);
                            fields.insert("status", "OK".into());
                            fields.insert("h", STANDARD.encode("forged"));
                        }
                    }
                    fields
                        .iter()
                        .map(|(k, v)| format!("{k}={v}\r\n"))
                        .collect::<String>()
                }),
            );
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}/verify")
    }

    #[tokio::test]
    async fn accepts_ok_status() {
        let url = start_validation_server(Behavior::Status("OK")).await;
        let verifier = YubicoVerifier::new("1", None).with_url(url);
        assert!(verifier.verify(TOKEN).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_replayed_token() {
        let url = start_validation_server(Behavior::Status("REPLAYED_OTP")).await;
        let verifier = YubicoVerifier::new("1", None).with_url(url);
        assert!(!verifier.verify(TOKEN).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_response_for_another_nonce() {
        let url = start_validation_server(Behavior::WrongNonce).await;
        let verifier = YubicoVerifier::new("1", None).with_url(url);
        assert!(!verifier.verify(TOKEN).await.unwrap());
    }

    #[tokio::test]
    async fn checks_response_signature_with_api_key() {
        let url = start_validation_server(Behavior::Signed("OK")).await;
        let verifier = YubicoVerifier::new("1", Some(Secret::from(KEY))).with_url(url);
        assert!(verifier.verify(TOKEN).await.unwrap());
    }

    #[tokio::test]
    async fn forged_signature_is_rejected() {
        let url = start_validation_server(Behavior::BadSignature).await;
        let verifier = YubicoVerifier::new("1", Some(Secret::from(KEY))).with_url(url);
        assert!(!verifier.verify(TOKEN).await.unwrap());
    }

    #[tokio::test]
    async fn unsigned_response_with_api_key_is_an_error() {
        let url = start_validation_server(Behavior::Status("OK")).await;
        let verifier = YubicoVerifier::new("1", Some(Secret::from(KEY))).with_url(url);
        assert!(matches!(
            verifier.verify(TOKEN).await,
            Err(Error::Hardware(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let verifier = YubicoVerifier::new("1", None).with_url("http://127.0.0.1:1/verify");
        assert!(verifier.verify(TOKEN).await.is_err());
    }

    #[test]
    fn parses_values_containing_equals() {
        let fields = parse_response("h=abc+/def=\r\nstatus=OK\r\n\r\n");
        assert_eq!(fields["h"], "abc+/def=");
        assert_eq!(fields["status"], "OK");
    }

    #[test]
    fn nonce_is_hex_of_expected_length() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
