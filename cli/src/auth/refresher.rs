//! Identity token refresh grants.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::cache::CredentialStore;
use crate::auth::tokens::IdentityTokens;
use crate::client::{AuthFlow, AuthResult, IdentityProvider, TokenEndpoint};
use crate::error::{BrokerError, Result};

/// Exchanges a refresh token for a fresh token set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Performs one refresh round-trip.
    ///
    /// The returned set keeps `refresh_token` when the provider does not
    /// reissue one, and has already been written to the token cache.
    async fn refresh_oauth_tokens(&self, refresh_token: &str) -> Result<IdentityTokens>;
}

/// Cognito `REFRESH_TOKEN_AUTH` grant.
pub struct UserPoolRefresher {
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<dyn CredentialStore<IdentityTokens>>,
}

impl UserPoolRefresher {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cache: Arc<dyn CredentialStore<IdentityTokens>>,
    ) -> Self {
        Self { provider, cache }
    }
}

/// OIDC token endpoint refresh grant.
pub struct OidcRefresher {
    endpoint: Arc<dyn TokenEndpoint>,
    cache: Arc<dyn CredentialStore<IdentityTokens>>,
}

impl OidcRefresher {
    pub fn new(
        endpoint: Arc<dyn TokenEndpoint>,
        cache: Arc<dyn CredentialStore<IdentityTokens>>,
    ) -> Self {
        Self { endpoint, cache }
    }
}

/// Refresh grant chosen from the configured login flow.
pub enum Refresher {
    UserPool(UserPoolRefresher),
    Oidc(OidcRefresher),
}

fn persist(
    cache: &dyn CredentialStore<IdentityTokens>,
    tokens: IdentityTokens,
    previous_refresh_token: &str,
) -> Result<IdentityTokens> {
    let tokens = tokens.carry_refresh_token(previous_refresh_token);
    cache
        .put(&tokens)
        .map_err(|e| BrokerError::store("persist refreshed oauth tokens", e))?;
    Ok(tokens)
}

#[async_trait]
impl TokenRefresher for UserPoolRefresher {
    async fn refresh_oauth_tokens(&self, refresh_token: &str) -> Result<IdentityTokens> {
        let flow = AuthFlow::RefreshToken {
            refresh_token: refresh_token.to_string(),
        };
        match self.provider.initiate_auth(flow).await? {
            AuthResult::Authenticated(tokens) => persist(self.cache.as_ref(), tokens, refresh_token),
            AuthResult::Challenge(challenge) => Err(BrokerError::AuthFailed(format!(
                "refresh returned the '{}' challenge",
                challenge.name
            ))),
        }
    }
}

#[async_trait]
impl TokenRefresher for OidcRefresher {
    async fn refresh_oauth_tokens(&self, refresh_token: &str) -> Result<IdentityTokens> {
        let tokens = self.endpoint.exchange_refresh_token(refresh_token).await?;
        persist(self.cache.as_ref(), tokens, refresh_token)
    }
}

#[async_trait]
impl TokenRefresher for Refresher {
    async fn refresh_oauth_tokens(&self, refresh_token: &str) -> Result<IdentityTokens> {
        match self {
            Self::UserPool(r) => r.refresh_oauth_tokens(refresh_token).await,
            Self::Oidc(r) => r.refresh_oauth_tokens(refresh_token).await,
        }
    }
}
