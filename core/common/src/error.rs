//! Common error types for CloudLink.

use thiserror::Error;

/// Top-level error type for CloudLink operations.
///
/// Every variant is terminal for the workflow run that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// The user declined the consent flow.
    #[error("Sign-in cancelled by user")]
    UserCancelled,

    /// The identity provider returned an absent or malformed result.
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// The token endpoint rejected the assertion.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Account identity is malformed or does not match the credential.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Transport or server-side failure on the storage service.
    #[error("Remote storage error: {0}")]
    Remote(String),

    /// Local I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Classify the error without borrowing its payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UserCancelled => ErrorKind::UserCancelled,
            Error::Provider(_) => ErrorKind::Provider,
            Error::AuthFailed(_) => ErrorKind::AuthFailed,
            Error::InvalidAccount(_) => ErrorKind::InvalidAccount,
            Error::Remote(_) => ErrorKind::Remote,
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Copyable discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UserCancelled,
    Provider,
    AuthFailed,
    InvalidAccount,
    Remote,
    Io,
    InvalidInput,
    Serialization,
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
