//! Common types used throughout CloudLink.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Account identity in `local@domain` form.
///
/// Informational only: it labels the session and is never used as a secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Parse an account identifier.
    ///
    /// Surrounding whitespace is trimmed and the domain is lowercased.
    ///
    /// # Errors
    /// - `InvalidAccount` if the value is empty, contains whitespace, or is
    ///   not of the form `local@domain` with a dotted domain
    pub fn parse(value: impl AsRef<str>) -> crate::Result<Self> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(crate::Error::InvalidAccount(
                "Account cannot be empty".to_string(),
            ));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(crate::Error::InvalidAccount(format!(
                "Account contains whitespace: {}",
                value
            )));
        }

        let (local, domain) = value.split_once('@').ok_or_else(|| {
            crate::Error::InvalidAccount(format!("Account is not an email address: {}", value))
        })?;

        if local.is_empty() || domain.contains('@') {
            return Err(crate::Error::InvalidAccount(format!(
                "Malformed account: {}",
                value
            )));
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(crate::Error::InvalidAccount(format!(
                "Malformed account domain: {}",
                domain
            )));
        }

        Ok(Self(format!("{}@{}", local, domain.to_ascii_lowercase())))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Secret string that zeroizes on drop and never prints its value.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret for the one call that needs it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {} chars])", self.0.len())
    }
}
