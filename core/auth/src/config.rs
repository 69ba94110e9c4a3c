//! OAuth2 client configuration.

use serde::{Deserialize, Serialize};

/// OAuth2 client ID placeholder; real deployments override it in the config file.
const DEFAULT_CLIENT_ID: &str = "YOUR_CLIENT_ID";
/// OAuth2 authorization endpoint.
const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// OpenID Connect userinfo endpoint.
const DEFAULT_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
/// Redirect URL for the loopback consent flow.
const DEFAULT_REDIRECT_URL: &str = "http://127.0.0.1:8080/callback";

/// Configuration for the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Client ID registered with the identity provider.
    pub client_id: String,
    /// Client secret. Installed applications using PKCE may omit it.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Authorization (consent) endpoint.
    pub auth_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Endpoint that reports the account an access token belongs to.
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    /// Redirect URL the consent flow returns to.
    pub redirect_url: String,
    /// Account to preselect in the consent UI. Unverified until the
    /// exchanger confirms it against the userinfo endpoint.
    #[serde(default)]
    pub login_hint: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: None,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            userinfo_url: default_userinfo_url(),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            login_hint: None,
        }
    }
}

fn default_userinfo_url() -> String {
    DEFAULT_USERINFO_URL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_serialization() {
        let config = AuthConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AuthConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "client_id": "id",
            "auth_url": "https://idp.test/auth",
            "token_url": "https://idp.test/token",
            "redirect_url": "http://127.0.0.1:9000/cb"
        }"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.client_secret, None);
        assert_eq!(config.login_hint, None);
        assert_eq!(config.userinfo_url, DEFAULT_USERINFO_URL);
    }
}
