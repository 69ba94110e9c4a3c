//! Binding a session credential to one account and one scope.

use chrono::{DateTime, Utc};

use cloudlink_common::{AccountId, Error, Result, Secret};

use crate::scope::AuthorizationScope;

/// Server-recognised credential derived from an identity assertion.
///
/// Lives for one workflow run and is never persisted.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    /// Bearer token for storage requests.
    pub access_token: Secret,
    /// Account the credential was issued to.
    pub account: AccountId,
    /// Scope URIs the provider granted.
    pub granted_scopes: Vec<String>,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

/// Handle the remote storage client authenticates with.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    account: AccountId,
    scope: AuthorizationScope,
    credential: SessionCredential,
}

impl AuthorizedClient {
    /// Bind `account` and `scope` to `credential`.
    ///
    /// Pure construction; no network call is made.
    ///
    /// # Errors
    /// - `InvalidAccount` if `account` is malformed or is not the account the
    ///   credential was issued to
    /// - `AuthFailed` if the credential was not granted `scope`
    pub fn new(
        credential: SessionCredential,
        account: &str,
        scope: AuthorizationScope,
    ) -> Result<Self> {
        let account = AccountId::parse(account)?;

        if account != credential.account {
            return Err(Error::InvalidAccount(format!(
                "{} does not own this session",
                account
            )));
        }

        if !scope.is_granted_by(&credential.granted_scopes) {
            return Err(Error::AuthFailed(format!(
                "Session was not granted {} access",
                scope
            )));
        }

        Ok(Self {
            account,
            scope,
            credential,
        })
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.credential.access_token.expose())
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn scope(&self) -> AuthorizationScope {
        self.scope
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.credential.expires_at
    }
}
