//! Session strategy selection

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// Which [`SessionStrategy`](crate::SessionStrategy) remembers authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Mode {
    /// Host-supplied `pass` / `set_user` / `authenticated` functions
    #[default]
    Callback,
    /// User id stored in the host's session store, resumed by redirect
    Session,
    /// Identity lives on the current request only; no session store needed
    SinglePage,
    /// Fixed identity from a [`TestContext`](crate::TestContext)
    Test,
}

const MODES: &[(&str, Mode)] = &[
    ("callback", Mode::Callback),
    ("session", Mode::Session),
    ("single_page", Mode::SinglePage),
    ("test", Mode::Test),
];

impl Mode {
    pub fn as_str(self) -> &'static str {
        MODES
            .iter()
            .find(|(_, m)| *m == self)
            .map(|(name, _)| *name)
            .unwrap_or("callback")
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MODES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, mode)| *mode)
            .ok_or_else(|| ConfigError::UnknownMode(s.to_string()))
    }
}

impl TryFrom<String> for Mode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
