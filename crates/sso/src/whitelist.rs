//! Paths that bypass authentication
//!
//! Patterns are matched against the request path only, never the method or
//! query string. `/favicon.ico` is always exempt.

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::error::ConfigError;

/// Path always exempt from authentication.
pub const DEFAULT_WHITELIST: &[&str] = &["/favicon.ico"];

/// One whitelist entry.
#[derive(Debug, Clone)]
pub enum WhitelistPattern {
    /// Exact path
    Literal(String),
    /// Shell-style glob; `*` also crosses `/`
    Glob(GlobMatcher),
    /// Regular expression, unanchored unless the pattern anchors itself
    Regex(Regex),
}

impl WhitelistPattern {
    pub fn literal(path: impl Into<String>) -> Self {
        WhitelistPattern::Literal(path.into())
    }

    pub fn glob(pattern: &str) -> Result<Self, ConfigError> {
        Glob::new(pattern)
            .map(|g| WhitelistPattern::Glob(g.compile_matcher()))
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn regex(pattern: &str) -> Result<Self, ConfigError> {
        Regex::new(pattern)
            .map(WhitelistPattern::Regex)
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            WhitelistPattern::Literal(p) => p == path,
            WhitelistPattern::Glob(g) => g.is_match(path),
            WhitelistPattern::Regex(r) => r.is_match(path),
        }
    }
}

/// Ordered set of patterns; the first hit wins.
#[derive(Debug, Clone)]
pub struct Whitelist {
    patterns: Vec<WhitelistPattern>,
}

impl Whitelist {
    /// Default entries followed by `extra`.
    pub fn new(extra: impl IntoIterator<Item = WhitelistPattern>) -> Self {
        let mut patterns: Vec<WhitelistPattern> = DEFAULT_WHITELIST
            .iter()
            .map(|p| WhitelistPattern::literal(*p))
            .collect();
        patterns.extend(extra);
        Self { patterns }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::new([])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn favicon_is_always_whitelisted() {
        let whitelist = Whitelist::default();
        assert!(whitelist.matches("/favicon.ico"));
        assert!(!whitelist.matches("/favicon.ico/extra"));
        assert!(!whitelist.matches("/"));
    }

    #[test]
    fn literal_requires_exact_match() {
        let whitelist = Whitelist::new([WhitelistPattern::literal("/health")]);
        assert!(whitelist.matches("/health"));
        assert!(!whitelist.matches("/healthz"));
        assert!(!whitelist.matches("/api/health"));
    }

    #[test]
    fn glob_star_crosses_directories() {
        let whitelist = Whitelist::new([WhitelistPattern::glob("/public/*").unwrap()]);
        assert!(whitelist.matches("/public/app.js"));
        assert!(whitelist.matches("/public/img/logo.png"));
        assert!(!whitelist.matches("/private/app.js"));
    }

    #[test]
    fn glob_question_mark_and_classes() {
        let whitelist = Whitelist::new([WhitelistPattern::glob("/v[12]/status?").unwrap()]);
        assert!(whitelist.matches("/v1/statusz"));
        assert!(whitelist.matches("/v2/status1"));
        assert!(!whitelist.matches("/v3/statusz"));
    }

    #[test]
    fn regex_matches_anywhere_unless_anchored() {
        let whitelist = Whitelist::new([
            WhitelistPattern::regex(r"\.css$").unwrap(),
            WhitelistPattern::regex(r"^/hooks/\d+$").unwrap(),
        ]);
        assert!(whitelist.matches("/assets/site.css"));
        assert!(whitelist.matches("/hooks/42"));
        assert!(!whitelist.matches("/hooks/42/retry"));
        assert!(!whitelist.matches("/assets/site.css.map"));
    }

    #[test]
    fn invalid_patterns_are_config_errors() {
        assert!(matches!(
            WhitelistPattern::regex("(unclosed"),
            Err(ConfigError::InvalidPattern { .. })
        ));
        assert!(matches!(
            WhitelistPattern::glob("/a/[b"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn default_entries_come_first() {
        let whitelist = Whitelist::new([WhitelistPattern::literal("/health")]);
        assert_eq!(whitelist.len(), 2);
        assert!(!whitelist.is_empty());
    }
}
