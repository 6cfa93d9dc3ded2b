//! Types shared by the SSO gateway crates and the proxy binary

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
