//! Storage permissions a session may request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single, narrow storage capability.
///
/// Scopes are never built from free-form strings, so a session cannot ask
/// for broader access than one of these variants grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthorizationScope {
    /// Create, read and write only the files this application created.
    #[default]
    FileAccess,
    /// Read and write the application's private data folder.
    AppDataAccess,
}

impl AuthorizationScope {
    /// Scope URI sent to the identity provider.
    pub fn as_uri(&self) -> &'static str {
        match self {
            AuthorizationScope::FileAccess => "https://www.googleapis.com/auth/drive.file",
            AuthorizationScope::AppDataAccess => "https://www.googleapis.com/auth/drive.appdata",
        }
    }

    /// Whether a granted scope list from the token endpoint covers this capability.
    pub fn is_granted_by(&self, granted: &[String]) -> bool {
        granted.iter().any(|s| s == self.as_uri())
    }
}

impl fmt::Display for AuthorizationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationScope::FileAccess => write!(f, "file-access"),
            AuthorizationScope::AppDataAccess => write!(f, "app-data-access"),
        }
    }
}
