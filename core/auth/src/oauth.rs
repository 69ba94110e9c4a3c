//! OAuth2 client shared by the identity broker and the credential exchanger.

use oauth2::basic::BasicClient;
use serde::Deserialize;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};
use std::time::Duration;
use url::Url;

use cloudlink_common::{AccountId, Error, Result, Secret};

use crate::config::AuthConfig;
use crate::scope::AuthorizationScope;

/// Scopes that let the userinfo endpoint report the signed-in email.
const IDENTITY_SCOPES: [&str; 2] = ["openid", "email"];

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// A consent URL together with the values needed to validate its result.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL the user visits to grant consent.
    pub url: Url,
    /// CSRF state the redirect must echo back.
    pub csrf_state: String,
    /// PKCE verifier to present alongside the returned code.
    pub pkce_verifier: Secret,
}

/// Token endpoint response reduced to what a session needs.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Bearer token for storage requests.
    pub access_token: Secret,
    /// Scopes the provider reports as granted, if it reports any.
    pub granted_scopes: Option<Vec<String>>,
    /// Lifetime of the access token.
    pub expires_in: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
}

/// OAuth2 client for one identity provider.
#[derive(Clone)]
pub struct ProviderClient {
    client: ConfiguredClient,
    http: oauth2::reqwest::Client,
    config: AuthConfig,
}

impl ProviderClient {
    /// Create a new provider client.
    ///
    /// # Errors
    /// - `InvalidInput` if any endpoint URL fails to parse
    pub fn new(config: AuthConfig) -> Result<Self> {
        let mut client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
            );

        if let Some(secret) = &config.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        // Redirects are not followed so a token response cannot be bounced elsewhere.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http,
            config,
        })
    }

    /// Build the consent URL for `scope` plus the identity scopes.
    pub fn authorization_request(
        &self,
        scope: AuthorizationScope,
        login_hint: Option<&str>,
    ) -> AuthorizationRequest {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(scope.as_uri().to_string()))
            .add_scopes(IDENTITY_SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(challenge);

        if let Some(hint) = login_hint {
            request = request.add_extra_param("login_hint", hint.to_string());
        }

        let (url, csrf_token) = request.url();

        AuthorizationRequest {
            url,
            csrf_state: csrf_token.secret().clone(),
            pkce_verifier: Secret::new(verifier.secret().clone()),
        }
    }

    /// Exchange an authorization code for an access token.
    ///
    /// Issues exactly one request to the token endpoint.
    ///
    /// # Errors
    /// - `AuthFailed` if the endpoint rejects the code or cannot be reached
    pub async fn exchange_code(
        &self,
        code: &Secret,
        pkce_verifier: Option<&Secret>,
    ) -> Result<TokenGrant> {
        let mut request = self
            .client
            .exchange_code(AuthorizationCode::new(code.expose().to_string()));

        if let Some(verifier) = pkce_verifier {
            request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.expose().to_string()));
        }

        let token = request.request_async(&self.http).await.map_err(|e| match e {
            RequestTokenError::ServerResponse(response) => Error::AuthFailed(format!(
                "Token endpoint rejected assertion: {}",
                response.error()
            )),
            other => Error::AuthFailed(format!("Token exchange failed: {}", other)),
        })?;

        Ok(TokenGrant {
            access_token: Secret::new(token.access_token().secret().clone()),
            granted_scopes: token
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.to_string()).collect()),
            expires_in: token.expires_in(),
        })
    }

    /// Ask the userinfo endpoint which account `access_token` belongs to.
    ///
    /// # Errors
    /// - `AuthFailed` if the endpoint rejects the token or reports no verified email
    pub async fn fetch_account(&self, access_token: &Secret) -> Result<AccountId> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token.expose())
            .send()
            .await
            .map_err(|e| Error::AuthFailed(format!("Userinfo request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::AuthFailed(format!(
                "Userinfo endpoint returned {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::AuthFailed(format!("Userinfo response unreadable: {}", e)))?;
        let info: UserInfo = serde_json::from_slice(&body)
            .map_err(|e| Error::AuthFailed(format!("Userinfo response malformed: {}", e)))?;

        if info.email_verified == Some(false) {
            return Err(Error::AuthFailed(
                "Provider reports the account email as unverified".to_string(),
            ));
        }

        let email = info
            .email
            .ok_or_else(|| Error::AuthFailed("Userinfo response carried no email".to_string()))?;
        AccountId::parse(&email)
            .map_err(|e| Error::AuthFailed(format!("Userinfo email malformed: {}", e)))
    }

    /// Get the current configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            client_id: "test_id".to_string(),
            client_secret: Some("test_secret".to_string()),
            auth_url: "https://idp.test/auth".to_string(),
            token_url: "https://idp.test/token".to_string(),
            userinfo_url: "https://idp.test/userinfo".to_string(),
            redirect_url: "http://127.0.0.1:8080/callback".to_string(),
            login_hint: None,
        }
    }

    #[test]
    fn test_provider_client_creation() {
        let client = ProviderClient::new(test_config()).unwrap();
        assert_eq!(client.config().client_id, "test_id");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut config = test_config();
        config.token_url = "not a url".to_string();

        let err = ProviderClient::new(config).err().unwrap();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_authorization_url_generation() {
        let client = ProviderClient::new(test_config()).unwrap();
        let request =
            client.authorization_request(AuthorizationScope::FileAccess, Some("a@example.com"));

        let url = request.url.as_str();
        assert!(url.starts_with("https://idp.test/auth"));
        assert!(url.contains("client_id=test_id"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("login_hint=a%40example.com"));

        let pairs: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&(
            "scope".to_string(),
            format!("{} openid email", AuthorizationScope::FileAccess.as_uri())
        )));
        assert!(pairs.contains(&("state".to_string(), request.csrf_state.clone())));
        assert!(!request.pkce_verifier.is_empty());
    }

    #[test]
    fn test_each_request_has_fresh_state() {
        let client = ProviderClient::new(test_config()).unwrap();
        let first = client.authorization_request(AuthorizationScope::FileAccess, None);
        let second = client.authorization_request(AuthorizationScope::FileAccess, None);

        assert_ne!(first.csrf_state, second.csrf_state);
        assert!(!first.url.as_str().contains("login_hint"));
    }

    fn userinfo_client(server: &MockServer) -> ProviderClient {
        let config = AuthConfig {
            userinfo_url: server.url("/userinfo"),
            ..test_config()
        };
        ProviderClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_account_reads_verified_email() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/userinfo")
                    .header("authorization", "Bearer access");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(serde_json::json!({
                        "sub": "1234",
                        "email": "A@Example.com",
                        "email_verified": true,
                    }));
            })
            .await;

        let account = userinfo_client(&server)
            .fetch_account(&Secret::new("access"))
            .await
            .unwrap();

        mock.assert_hits_async(1).await;
        assert_eq!(account.as_str(), "A@example.com");
    }

    #[tokio::test]
    async fn test_fetch_account_rejects_unverified_or_missing_email() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/userinfo").header("authorization", "Bearer unverified");
                then.status(200).json_body(serde_json::json!({
                    "email": "a@example.com",
                    "email_verified": false,
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/userinfo").header("authorization", "Bearer anonymous");
                then.status(200).json_body(serde_json::json!({ "sub": "1234" }));
            })
            .await;

        let client = userinfo_client(&server);
        for token in ["unverified", "anonymous"] {
            let err = client.fetch_account(&Secret::new(token)).await.unwrap_err();
            assert!(matches!(err, Error::AuthFailed(_)), "{token}: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_fetch_account_rejected_token_is_auth_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/userinfo");
                then.status(401);
            })
            .await;

        let err = userinfo_client(&server)
            .fetch_account(&Secret::new("expired"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthFailed(_)));
    }
}
