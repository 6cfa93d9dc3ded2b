//! Placeholder substitution for the login, OTP and setup pages
//!
//! Not a template language: every `%name%` is replaced with a value, layer
//! by layer. Layers are applied in order and a placeholder is consumed by
//! the first layer that names it, so earlier layers win over later ones.
//! The gateway always applies `csrf` first, then `public` and `origin`,
//! then any caller layers (user fields, setup values). Pages are a
//! user-visible compatibility surface; keep this precedence stable.
//!
//! Values are inserted verbatim, without HTML escaping. That includes
//! `origin` (built from the `Host` header and request URI), user attributes
//! returned by the identity API, and the link in the gateway's 405 body.
//! Existing pages depend on this raw substitution; custom templates that
//! place these values in attributes or markup must account for it.

use std::path::Path;

/// One ordered set of `(name, value)` replacements.
pub type Layer = Vec<(String, String)>;

const LOGIN_PAGE: &str = include_str!("../templates/login.html");
const OTP_PAGE: &str = include_str!("../templates/otp.html");
const SETUP_PAGE: &str = include_str!("../templates/setup.html");

/// Page contents the gateway fills in.
#[derive(Debug, Clone)]
pub struct Templates {
    pub login: String,
    pub otp: String,
    pub setup: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            login: LOGIN_PAGE.to_string(),
            otp: OTP_PAGE.to_string(),
            setup: SETUP_PAGE.to_string(),
        }
    }
}

impl Templates {
    /// Read any overridden pages from disk, keeping the built-in ones for
    /// the rest.
    pub fn load(
        login: Option<&Path>,
        otp: Option<&Path>,
        setup: Option<&Path>,
    ) -> std::io::Result<Self> {
        let mut templates = Self::default();
        if let Some(path) = login {
            templates.login = std::fs::read_to_string(path)?;
        }
        if let Some(path) = otp {
            templates.otp = std::fs::read_to_string(path)?;
        }
        if let Some(path) = setup {
            templates.setup = std::fs::read_to_string(path)?;
        }
        Ok(templates)
    }
}

/// Build a layer from borrowed pairs.
pub fn layer<const N: usize>(pairs: [(&str, &str); N]) -> Layer {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Replace `%name%` placeholders layer by layer.
pub fn render(content: &str, layers: &[Layer]) -> String {
    let mut out = content.to_string();
    for (name, value) in layers.iter().flatten() {
        out = out.replace(&format!("%{name}%"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_occurrence() {
        let out = render("%a% and %a%", &[layer([("a", "x")])]);
        assert_eq!(out, "x and x");
    }

    #[test]
    fn earlier_layers_win() {
        let out = render(
            "%origin%|%login%",
            &[
                layer([("origin", "https://app.example/")]),
                layer([("origin", "evil"), ("login", "bob")]),
            ],
        );
        assert_eq!(out, "https://app.example/|bob");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let out = render("100% sure, %missing%", &[layer([("a", "x")])]);
        assert_eq!(out, "100% sure, %missing%");
    }

    #[test]
    fn empty_value_clears_placeholder() {
        let out = render("<input value=\"%csrf%\">", &[layer([("csrf", "")])]);
        assert_eq!(out, "<input value=\"\">");
    }

    #[test]
    fn builtin_pages_carry_expected_placeholders() {
        let t = Templates::default();
        for p in ["%public%", "%origin%", "%endpoint%", "%csrf%"] {
            assert!(t.login.contains(p), "login page lacks {p}");
        }
        for p in ["%token%", "%login%", "%origin%"] {
            assert!(t.otp.contains(p), "otp page lacks {p}");
        }
        for p in ["%otp_secret%", "%otp_url%", "%qr_img%", "%token%"] {
            assert!(t.setup.contains(p), "setup page lacks {p}");
        }
    }

    #[test]
    fn load_overrides_only_given_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("login.html");
        std::fs::write(&path, "custom %origin%").unwrap();

        let t = Templates::load(Some(&path), None, None).unwrap();
        assert_eq!(t.login, "custom %origin%");
        assert_eq!(t.otp, Templates::default().otp);
    }

    #[test]
    fn load_fails_for_missing_file() {
        assert!(Templates::load(Some(Path::new("/nonexistent/login.html")), None, None).is_err());
    }
}
