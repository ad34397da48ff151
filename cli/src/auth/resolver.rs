//! Resolves a currently valid identity token set.

use std::sync::Arc;

use crate::auth::cache::{CredentialStore, StoreError};
use crate::auth::refresher::TokenRefresher;
use crate::auth::tokens::IdentityTokens;
use crate::error::{BrokerError, Result};

/// Loads cached identity tokens and refreshes them when expired.
#[derive(Clone)]
pub struct TokensResolver {
    cache: Arc<dyn CredentialStore<IdentityTokens>>,
    refresher: Arc<dyn TokenRefresher>,
}

impl TokensResolver {
    pub fn new(
        cache: Arc<dyn CredentialStore<IdentityTokens>>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self { cache, refresher }
    }

    /// The token cache this resolver reads and writes.
    pub fn cache(&self) -> &dyn CredentialStore<IdentityTokens> {
        self.cache.as_ref()
    }

    /// Returns cached tokens, refreshing them first if they have expired.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::NoSession`] if no usable tokens are cached
    /// - [`BrokerError::RefreshFailed`] if the refresh grant fails
    /// - [`BrokerError::Store`] if the cache cannot be read or written
    pub async fn get_tokens(&self) -> Result<IdentityTokens> {
        let tokens = match self.cache.get() {
            Ok(tokens) => tokens,
            Err(e @ StoreError::NotFound(_)) => {
                tracing::debug!("no oauth tokens cached");
                return Err(BrokerError::NoSession(e));
            },
            Err(e @ StoreError::Corrupt { .. }) => {
                tracing::warn!(error = %e, "ignoring unreadable oauth tokens");
                return Err(BrokerError::NoSession(e));
            },
            Err(e) => return Err(BrokerError::store("load oauth tokens", e)),
        };

        if !tokens.has_expired() {
            tracing::debug!(expiry = %tokens.expiry, "using cached oauth tokens");
            return Ok(tokens);
        }

        if tokens.refresh_token.is_empty() {
            return Err(BrokerError::RefreshFailed(Box::new(BrokerError::AuthFailed(
                "no refresh token is stored".to_string(),
            ))));
        }

        tracing::info!(expired = %tokens.expiry, "oauth tokens expired, refreshing");
        let refreshed = self
            .refresher
            .refresh_oauth_tokens(&tokens.refresh_token)
            .await
            .map_err(|e| BrokerError::RefreshFailed(Box::new(e)))?
            .carry_refresh_token(&tokens.refresh_token);

        self.cache
            .put(&refreshed)
            .map_err(|e| BrokerError::store("persist refreshed oauth tokens", e))?;

        Ok(refreshed)
    }
}
