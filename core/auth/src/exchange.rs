//! Credential exchange: identity assertion in, session credential out.

use async_trait::async_trait;
use chrono::{Duration, Utc};

use cloudlink_common::{Error, Result};

use crate::authorize::{AuthorizedClient, SessionCredential};
use crate::broker::IdentityAssertion;
use crate::oauth::ProviderClient;
use crate::scope::AuthorizationScope;

/// Exchanges assertions for credentials and binds them to a scope.
#[async_trait]
pub trait CredentialExchanger: Send + Sync {
    /// Submit `assertion` to the token endpoint.
    ///
    /// The credential's account is the one the provider reports for the
    /// issued token, not the assertion's hint.
    ///
    /// # Errors
    /// - `AuthFailed` if the assertion is rejected or the account cannot be
    ///   confirmed; a fresh assertion is needed
    async fn exchange(&self, assertion: IdentityAssertion) -> Result<SessionCredential>;

    /// Build the handle the storage client authenticates with.
    ///
    /// # Errors
    /// - `InvalidAccount` if `account` is malformed or foreign to `credential`
    /// - `AuthFailed` if `scope` was not granted to `credential`
    fn authorize(
        &self,
        credential: SessionCredential,
        account: &str,
        scope: AuthorizationScope,
    ) -> Result<AuthorizedClient> {
        AuthorizedClient::new(credential, account, scope)
    }
}

/// Exchanger that redeems authorization codes at an OAuth2 token endpoint.
pub struct OAuthExchanger {
    client: ProviderClient,
    scope: AuthorizationScope,
}

impl OAuthExchanger {
    /// Create an exchanger expecting `scope` to be granted.
    pub fn new(client: ProviderClient, scope: AuthorizationScope) -> Self {
        Self { client, scope }
    }
}

#[async_trait]
impl CredentialExchanger for OAuthExchanger {
    async fn exchange(&self, assertion: IdentityAssertion) -> Result<SessionCredential> {
        tracing::info!(hint = ?assertion.account, "Exchanging identity assertion");

        let grant = self
            .client
            .exchange_code(&assertion.token, assertion.pkce_verifier.as_ref())
            .await?;

        // Providers omit `scope` when it equals the requested set.
        let granted_scopes = grant
            .granted_scopes
            .unwrap_or_else(|| vec![self.scope.as_uri().to_string()]);

        if !self.scope.is_granted_by(&granted_scopes) {
            return Err(Error::AuthFailed(format!(
                "Provider did not grant {} access",
                self.scope
            )));
        }

        let account = self.client.fetch_account(&grant.access_token).await?;

        let expires_in = grant
            .expires_in
            .unwrap_or_else(|| std::time::Duration::from_secs(3600));
        let expires_at =
            Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

        tracing::debug!(%account, %expires_at, "Session credential issued");

        Ok(SessionCredential {
            access_token: grant.access_token,
            account,
            granted_scopes,
            expires_at,
        })
    }
}
