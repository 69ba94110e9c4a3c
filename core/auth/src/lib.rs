//! Sign-in and credential handling for CloudLink.
//!
//! The identity broker runs an interactive OAuth2 consent flow and yields an
//! [`IdentityAssertion`]. The credential exchanger redeems that assertion at
//! the token endpoint and binds the resulting session to a single
//! [`AuthorizationScope`], producing the [`AuthorizedClient`] the storage
//! layer authenticates with.

pub mod authorize;
pub mod broker;
pub mod config;
pub mod consent;
pub mod exchange;
pub mod oauth;
pub mod scope;

pub use authorize::{AuthorizedClient, SessionCredential};
pub use broker::{
    CallbackParams, ConsentOutcome, ConsentRequest, ConsentSurface, IdentityAssertion,
    IdentityBroker, IdentityProvider,
};
pub use config::AuthConfig;
pub use consent::LoopbackConsent;
pub use exchange::{CredentialExchanger, OAuthExchanger};
pub use oauth::ProviderClient;
pub use scope::AuthorizationScope;
