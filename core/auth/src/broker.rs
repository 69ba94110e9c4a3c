//! Identity broker: turns an interactive consent flow into an identity assertion.

use async_trait::async_trait;
use url::Url;

use cloudlink_common::{Error, Result, Secret};

use crate::oauth::ProviderClient;
use crate::scope::AuthorizationScope;

/// Short-lived proof of identity issued after user consent.
///
/// Consumed once by the credential exchanger.
#[derive(Debug)]
pub struct IdentityAssertion {
    /// Authorization code returned by the consent flow.
    pub token: Secret,
    /// Account the consent page was asked to preselect, if any.
    ///
    /// Unverified; the exchanger learns the real account from the provider.
    pub account: Option<String>,
    /// PKCE verifier bound to the consent request, if one was used.
    pub pkce_verifier: Option<Secret>,
}

/// What the consent surface is asked to show.
#[derive(Debug, Clone)]
pub struct ConsentRequest {
    /// Consent page URL.
    pub url: Url,
    /// Where the provider redirects once the user decides.
    pub redirect_url: Url,
}

/// Query parameters delivered to the redirect URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Collect the recognised parameters from a redirect URL.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }
}

/// Result of presenting the consent UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// The provider redirected back; the payload may still carry an error.
    Completed(CallbackParams),
    /// The user closed the surface without deciding.
    Cancelled,
}

/// External, user-facing surface that hosts the consent flow.
#[async_trait]
pub trait ConsentSurface: Send + Sync {
    /// Show the consent page and wait for the user to finish.
    async fn present(&self, request: &ConsentRequest) -> Result<ConsentOutcome>;
}

/// Source of identity assertions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the consent flow once.
    ///
    /// # Errors
    /// - `UserCancelled` if the user declines
    /// - `Provider` if the result is absent, malformed or fails the state check
    async fn request_identity(&self) -> Result<IdentityAssertion>;
}

/// Identity provider backed by an OAuth2 authorization-code flow.
pub struct IdentityBroker<S> {
    client: ProviderClient,
    scope: AuthorizationScope,
    surface: S,
}

impl<S: ConsentSurface> IdentityBroker<S> {
    /// Create a broker that requests `scope` through `surface`.
    pub fn new(client: ProviderClient, scope: AuthorizationScope, surface: S) -> Self {
        Self {
            client,
            scope,
            surface,
        }
    }

    fn interpret(
        &self,
        outcome: ConsentOutcome,
        expected_state: &str,
        pkce_verifier: Secret,
    ) -> Result<IdentityAssertion> {
        let params = match outcome {
            ConsentOutcome::Cancelled => return Err(Error::UserCancelled),
            ConsentOutcome::Completed(params) => params,
        };

        if let Some(error) = params.error {
            if error == "access_denied" {
                return Err(Error::UserCancelled);
            }
            let detail = params
                .error_description
                .map(|d| format!("{}: {}", error, d))
                .unwrap_or(error);
            return Err(Error::Provider(detail));
        }

        match params.state.as_deref() {
            Some(state) if state == expected_state => {}
            Some(_) => {
                return Err(Error::Provider(
                    "Consent result state does not match request".to_string(),
                ))
            }
            None => {
                return Err(Error::Provider(
                    "Consent result carried no state".to_string(),
                ))
            }
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Provider("Consent completed without an identity result".to_string()))?;

        Ok(IdentityAssertion {
            token: Secret::new(code),
            account: self.client.config().login_hint.clone(),
            pkce_verifier: Some(pkce_verifier),
        })
    }
}

#[async_trait]
impl<S: ConsentSurface> IdentityProvider for IdentityBroker<S> {
    async fn request_identity(&self) -> Result<IdentityAssertion> {
        let config = self.client.config();
        let request = self
            .client
            .authorization_request(self.scope, config.login_hint.as_deref());

        let redirect_url = Url::parse(&config.redirect_url)
            .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?;

        tracing::info!(scope = %self.scope, "Requesting identity through consent flow");

        let outcome = self
            .surface
            .present(&ConsentRequest {
                url: request.url,
                redirect_url,
            })
            .await?;

        let assertion = self.interpret(outcome, &request.csrf_state, request.pkce_verifier)?;
        tracing::info!(hint = ?assertion.account, "Identity assertion received");

        Ok(assertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use std::sync::Mutex;

    /// Surface that echoes the request state into a scripted callback.
    struct ScriptedSurface {
        outcome: ConsentOutcome,
        echo_state: bool,
        seen: Mutex<Vec<Url>>,
    }

    impl ScriptedSurface {
        fn completed(params: CallbackParams) -> Self {
            Self {
                outcome: ConsentOutcome::Completed(params),
                echo_state: true,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ConsentSurface for ScriptedSurface {
        async fn present(&self, request: &ConsentRequest) -> Result<ConsentOutcome> {
            self.seen.lock().unwrap().push(request.url.clone());

            let mut outcome = self.outcome.clone();
            if let ConsentOutcome::Completed(params) = &mut outcome {
                if self.echo_state && params.state.is_none() {
                    params.state = request
                        .url
                        .query_pairs()
                        .find(|(k, _)| k == "state")
                        .map(|(_, v)| v.into_owned());
                }
            }
            Ok(outcome)
        }
    }

    fn broker(surface: ScriptedSurface, login_hint: Option<&str>) -> IdentityBroker<ScriptedSurface> {
        let config = AuthConfig {
            client_id: "test_id".to_string(),
            client_secret: None,
            auth_url: "https://idp.test/auth".to_string(),
            token_url: "https://idp.test/token".to_string(),
            userinfo_url: "https://idp.test/userinfo".to_string(),
            redirect_url: "http://127.0.0.1:8080/callback".to_string(),
            login_hint: login_hint.map(String::from),
        };
        let client = ProviderClient::new(config).unwrap();
        IdentityBroker::new(client, AuthorizationScope::FileAccess, surface)
    }

    #[tokio::test]
    async fn test_successful_consent_yields_assertion() {
        let surface = ScriptedSurface::completed(CallbackParams {
            code: Some("tok123".to_string()),
            ..Default::default()
        });
        let broker = broker(surface, None);

        let assertion = broker.request_identity().await.unwrap();
        assert_eq!(assertion.token.expose(), "tok123");
        assert_eq!(assertion.account, None);
        assert!(assertion.pkce_verifier.is_some());
        assert_eq!(broker.surface.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_login_hint_supplies_account() {
        let surface = ScriptedSurface::completed(CallbackParams {
            code: Some("tok123".to_string()),
            ..Default::default()
        });
        let broker = broker(surface, Some("hint@example.com"));

        let assertion = broker.request_identity().await.unwrap();
        assert_eq!(assertion.account.as_deref(), Some("hint@example.com"));
    }

    #[tokio::test]
    async fn test_cancelled_surface_is_user_cancelled() {
        let surface = ScriptedSurface {
            outcome: ConsentOutcome::Cancelled,
            echo_state: true,
            seen: Mutex::new(Vec::new()),
        };
        let err = broker(surface, None).request_identity().await.unwrap_err();
        assert!(matches!(err, Error::UserCancelled));
    }

    #[tokio::test]
    async fn test_access_denied_is_user_cancelled() {
        let surface = ScriptedSurface::completed(CallbackParams {
            error: Some("access_denied".to_string()),
            ..Default::default()
        });
        let err = broker(surface, None).request_identity().await.unwrap_err();
        assert!(matches!(err, Error::UserCancelled));
    }

    #[tokio::test]
    async fn test_other_provider_error() {
        let surface = ScriptedSurface::completed(CallbackParams {
            error: Some("server_error".to_string()),
            error_description: Some("try later".to_string()),
            ..Default::default()
        });
        let err = broker(surface, None).request_identity().await.unwrap_err();
        match err {
            Error::Provider(msg) => assert_eq!(msg, "server_error: try later"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_code_is_provider_error() {
        let surface = ScriptedSurface::completed(CallbackParams::default());
        let err = broker(surface, None).request_identity().await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_state_mismatch_is_provider_error() {
        let surface = ScriptedSurface::completed(CallbackParams {
            code: Some("tok123".to_string()),
            state: Some("forged".to_string()),
            ..Default::default()
        });
        let err = broker(surface, None).request_identity().await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_provider_redirect_without_email_yields_assertion() {
        let url = Url::parse(
            "http://127.0.0.1:8080/callback?state=S&code=4%2F0Adeu5B\
             &scope=email%20openid%20https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive.file\
             &authuser=0&prompt=consent",
        )
        .unwrap();
        let mut params = CallbackParams::from_url(&url);
        assert_eq!(params.code.as_deref(), Some("4/0Adeu5B"));
        assert_eq!(params.state.as_deref(), Some("S"));

        params.state = None;
        let broker = broker(ScriptedSurface::completed(params), None);

        let assertion = broker.request_identity().await.unwrap();
        assert_eq!(assertion.token.expose(), "4/0Adeu5B");
        assert_eq!(assertion.account, None);
    }

    #[test]
    fn test_callback_params_from_url() {
        let url = Url::parse(
            "http://127.0.0.1:8080/callback?code=abc&state=xyz&scope=ignored&authuser=1",
        )
        .unwrap();
        let params = CallbackParams::from_url(&url);

        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert_eq!(params.error, None);
    }
}
