//! API credentials.
//!
//! A [`Credential`] is handed to the client a caller constructs for its own
//! session and never leaves it: there is no process-wide key, `Debug` output
//! is redacted, and nothing in the crate writes it anywhere.

use crate::error::VerifyError;
use std::fmt;

/// Environment variable consulted by [`CredentialSource::default`].
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// A bearer credential for the completion endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key, rejecting empty or whitespace-only values.
    pub fn new(key: impl Into<String>) -> Result<Self, VerifyError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(VerifyError::MissingCredential {
                hint: "The API key is empty.".into(),
            });
        }
        Ok(Self(key))
    }

    /// The raw key, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Where to obtain a credential at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// A value the caller already holds (prompt, secret store, flag).
    Explicit(String),
    /// Read from the named environment variable.
    Environment(String),
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Environment(DEFAULT_API_KEY_ENV.to_string())
    }
}

impl CredentialSource {
    /// Resolve the source into a usable credential.
    pub fn resolve(&self) -> Result<Credential, VerifyError> {
        match self {
            CredentialSource::Explicit(key) => Credential::new(key.as_str()),
            CredentialSource::Environment(var) => match std::env::var(var) {
                Ok(key) if !key.trim().is_empty() => Credential::new(key),
                _ => Err(VerifyError::MissingCredential {
                    hint: format!("Set {var}=<your key> or pass --api-key."),
                }),
            },
        }
    }
}
