//! Resolves usable AWS credentials, re-federating when needed.

use std::sync::Arc;

use crate::auth::cache::{CredentialStore, StoreError};
use crate::auth::federation::FederationExchanger;
use crate::auth::resolver::TokensResolver;
use crate::auth::tokens::AwsCredentials;
use crate::client::IdentityProvider;
use crate::error::{BrokerError, Result};

/// Returns cached AWS credentials, or mints new ones from the current
/// identity tokens when the cache is stale.
pub struct CredentialsResolver {
    cache: Arc<dyn CredentialStore<AwsCredentials>>,
    tokens: TokensResolver,
    federation: FederationExchanger,
    sign_out: Option<Arc<dyn IdentityProvider>>,
}

impl CredentialsResolver {
    /// Creates a resolver.
    ///
    /// `sign_out` is the provider used for global sign-out on logout. Flows
    /// without a revocation endpoint pass `None` and only clear local state.
    pub fn new(
        cache: Arc<dyn CredentialStore<AwsCredentials>>,
        tokens: TokensResolver,
        federation: FederationExchanger,
        sign_out: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        Self {
            cache,
            tokens,
            federation,
            sign_out,
        }
    }

    /// The token resolver backing this resolver.
    pub const fn tokens(&self) -> &TokensResolver {
        &self.tokens
    }

    /// The credential cache this resolver reads and writes.
    pub fn cache(&self) -> &dyn CredentialStore<AwsCredentials> {
        self.cache.as_ref()
    }

    /// Returns valid AWS credentials.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::CredentialsRefresh`] if stale credentials
    /// could not be replaced, or [`BrokerError::Store`] if the cache
    /// backend is unavailable.
    pub async fn get_aws_credentials(&self) -> Result<AwsCredentials> {
        match self.cache.get() {
            Ok(creds) if !creds.has_expired() => {
                tracing::debug!(expiry = %creds.expiry, "using cached aws credentials");
                return Ok(creds);
            },
            Ok(creds) => tracing::info!(expired = %creds.expiry, "aws credentials expired"),
            Err(StoreError::NotFound(_)) => tracing::debug!("no aws credentials cached"),
            Err(e @ StoreError::Corrupt { .. }) => {
                tracing::warn!(error = %e, "ignoring unreadable aws credentials");
            },
            Err(e) => return Err(BrokerError::store("load aws credentials", e)),
        }

        self.refresh_aws_credentials().await
    }

    /// Mints and stores new AWS credentials regardless of the cache.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::CredentialsRefresh`] wrapping the failing stage.
    pub async fn refresh_aws_credentials(&self) -> Result<AwsCredentials> {
        let attempt = async {
            let tokens = self.tokens.get_tokens().await?;
            self.federate(&tokens.id_token).await
        };
        attempt
            .await
            .map_err(|e| BrokerError::CredentialsRefresh(Box::new(e)))
    }

    /// Exchanges `id_token` for AWS credentials and stores them.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::FederationFailed`] or [`BrokerError::Store`].
    pub async fn federate(&self, id_token: &str) -> Result<AwsCredentials> {
        let creds = self.federation.exchange(id_token).await?;
        self.cache
            .put(&creds)
            .map_err(|e| BrokerError::store("persist aws credentials", e))?;
        Ok(creds)
    }

    /// Ends the session.
    ///
    /// Global sign-out is attempted with the current access token, then both
    /// cached records are removed even if the remote call failed.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Store`] if a record could not be removed, else
    /// [`BrokerError::SignOutFailed`] if the remote sign-out failed.
    pub async fn logout(&self) -> Result<()> {
        let remote = self.sign_out_remotely().await;
        if let Err(e) = &remote {
            tracing::warn!(error = %e, "remote sign-out failed, clearing local state anyway");
        }

        let tokens_deleted = self.tokens.cache().delete();
        let creds_deleted = self.cache.delete();

        tokens_deleted.map_err(|e| BrokerError::store("delete oauth tokens", e))?;
        creds_deleted.map_err(|e| BrokerError::store("delete aws credentials", e))?;
        remote
    }

    async fn sign_out_remotely(&self) -> Result<()> {
        let Some(provider) = &self.sign_out else {
            tracing::debug!("login flow has no global sign-out");
            return Ok(());
        };

        let tokens = match self.tokens.get_tokens().await {
            Ok(tokens) => tokens,
            Err(BrokerError::NoSession(_)) => {
                tracing::debug!("no session to sign out");
                return Ok(());
            },
            Err(e) => return Err(BrokerError::SignOutFailed(e.to_string())),
        };

        provider
            .global_sign_out(&tokens.access_token)
            .await
            .map_err(|e| BrokerError::SignOutFailed(e.to_string()))?;
        tracing::info!("signed out globally");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cache::FileCache;
    use crate::auth::refresher::MockTokenRefresher;
    use crate::auth::tokens::IdentityTokens;
    use crate::client::identity_pool::MockIdentityPool;
    use crate::client::identity_provider::MockIdentityProvider;
    use chrono::{Duration, SubsecRound, Utc};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        token_cache: Arc<FileCache<IdentityTokens>>,
        creds_cache: Arc<FileCache<AwsCredentials>>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            Self {
                token_cache: Arc::new(FileCache::in_dir(dir.path())),
                creds_cache: Arc::new(FileCache::in_dir(dir.path())),
                _dir: dir,
            }
        }

        fn resolver(
            &self,
            refresher: MockTokenRefresher,
            pool: MockIdentityPool,
            sign_out: Option<MockIdentityProvider>,
        ) -> CredentialsResolver {
            let tokens = TokensResolver::new(self.token_cache.clone(), Arc::new(refresher));
            let federation =
                FederationExchanger::new(Arc::new(pool), "ap-southeast-2:pool", "accounts.google.com");
            CredentialsResolver::new(
                self.creds_cache.clone(),
                tokens,
                federation,
                sign_out.map(|p| Arc::new(p) as Arc<dyn IdentityProvider>),
            )
        }
    }

    fn tokens(offset_secs: i64) -> IdentityTokens {
        IdentityTokens {
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            id_token: "I1".to_string(),
            expiry: (Utc::now() + Duration::seconds(offset_secs)).trunc_subsecs(0),
        }
    }

    fn creds(key: &str, offset_secs: i64) -> AwsCredentials {
        AwsCredentials {
            access_key: key.to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "session".to_string(),
            expiry: (Utc::now() + Duration::seconds(offset_secs)).trunc_subsecs(0),
        }
    }

    fn no_refresh() -> MockTokenRefresher {
        let mut refresher = MockTokenRefresher::new();
        refresher.expect_refresh_oauth_tokens().never();
        refresher
    }

    fn pool_returning(key: &'static str) -> MockIdentityPool {
        let mut pool = MockIdentityPool::new();
        pool.expect_get_id()
            .times(1)
            .returning(|_, _| Ok("identity-1".to_string()));
        pool.expect_get_credentials_for_identity()
            .times(1)
            .returning(move |_, _| Ok(creds(key, 3600)));
        pool
    }

    #[tokio::test]
    async fn valid_cached_credentials_need_no_calls() {
        let fx = Fixture::new();
        let mut pool = MockIdentityPool::new();
        pool.expect_get_id().never();
        pool.expect_get_credentials_for_identity().never();
        let resolver = fx.resolver(no_refresh(), pool, None);

        let cached = creds("AKIA1", 600);
        fx.creds_cache.put(&cached).unwrap();

        assert_eq!(resolver.get_aws_credentials().await.unwrap(), cached);
        assert_eq!(resolver.get_aws_credentials().await.unwrap(), cached);
    }

    #[tokio::test]
    async fn expired_credentials_are_federated_once() {
        let fx = Fixture::new();
        let resolver = fx.resolver(no_refresh(), pool_returning("AKIA2"), None);

        fx.token_cache.put(&tokens(600)).unwrap();
        fx.creds_cache.put(&creds("AKIA1", -1)).unwrap();

        let resolved = resolver.get_aws_credentials().await.unwrap();
        assert_eq!(resolved.access_key, "AKIA2");
        assert_eq!(fx.creds_cache.get().unwrap(), resolved);
    }

    #[tokio::test]
    async fn corrupt_credentials_are_replaced() {
        let fx = Fixture::new();
        let resolver = fx.resolver(no_refresh(), pool_returning("AKIA2"), None);

        fx.token_cache.put(&tokens(600)).unwrap();
        std::fs::write(fx.creds_cache.path(), "not json").unwrap();

        let resolved = resolver.get_aws_credentials().await.unwrap();
        assert_eq!(resolved.access_key, "AKIA2");
    }

    #[tokio::test]
    async fn expired_tokens_are_refreshed_before_federation() {
        let fx = Fixture::new();
        let mut refresher = MockTokenRefresher::new();
        refresher
            .expect_refresh_oauth_tokens()
            .withf(|token| token == "R1")
            .times(1)
            .returning(|_| {
                let mut fresh = tokens(3600);
                fresh.id_token = "I2".to_string();
                fresh.refresh_token = String::new();
                Ok(fresh)
            });
        let mut pool = MockIdentityPool::new();
        pool.expect_get_id()
            .withf(|_, logins| logins.get("accounts.google.com").map(String::as_str) == Some("I2"))
            .times(1)
            .returning(|_, _| Ok("identity-1".to_string()));
        pool.expect_get_credentials_for_identity()
            .times(1)
            .returning(|_, _| Ok(creds("AKIA2", 3600)));
        let resolver = fx.resolver(refresher, pool, None);

        fx.token_cache.put(&tokens(-1)).unwrap();

        let resolved = resolver.get_aws_credentials().await.unwrap();
        assert_eq!(resolved.access_key, "AKIA2");
        let stored = fx.token_cache.get().unwrap();
        assert_eq!(stored.id_token, "I2");
        assert_eq!(stored.refresh_token, "R1");
    }

    #[tokio::test]
    async fn missing_session_is_reported_as_reauth() {
        let fx = Fixture::new();
        let mut pool = MockIdentityPool::new();
        pool.expect_get_id().never();
        let resolver = fx.resolver(no_refresh(), pool, None);

        let err = resolver.get_aws_credentials().await.unwrap_err();
        assert!(matches!(err, BrokerError::CredentialsRefresh(_)));
        assert!(err.requires_reauth());
    }

    #[tokio::test]
    async fn federation_failure_leaves_credentials_untouched() {
        let fx = Fixture::new();
        let mut pool = MockIdentityPool::new();
        pool.expect_get_id()
            .returning(|_, _| Err(BrokerError::ServiceUnavailable));
        let resolver = fx.resolver(no_refresh(), pool, None);

        fx.token_cache.put(&tokens(600)).unwrap();
        let stale = creds("AKIA1", -60);
        fx.creds_cache.put(&stale).unwrap();

        let err = resolver.get_aws_credentials().await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(fx.creds_cache.get().unwrap(), stale);
    }

    #[tokio::test]
    async fn logout_signs_out_and_clears_both_records() {
        let fx = Fixture::new();
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_global_sign_out()
            .withf(|token| token == "A1")
            .times(1)
            .returning(|_| Ok(()));
        let resolver = fx.resolver(no_refresh(), MockIdentityPool::new(), Some(provider));

        fx.token_cache.put(&tokens(600)).unwrap();
        fx.creds_cache.put(&creds("AKIA1", 600)).unwrap();

        resolver.logout().await.unwrap();
        assert!(matches!(fx.token_cache.get(), Err(StoreError::NotFound(_))));
        assert!(matches!(fx.creds_cache.get(), Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn logout_clears_local_state_when_sign_out_fails() {
        let fx = Fixture::new();
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_global_sign_out()
            .returning(|_| Err(BrokerError::ServiceUnavailable));
        let resolver = fx.resolver(no_refresh(), MockIdentityPool::new(), Some(provider));

        fx.token_cache.put(&tokens(600)).unwrap();
        fx.creds_cache.put(&creds("AKIA1", 600)).unwrap();

        let err = resolver.logout().await.unwrap_err();
        assert!(matches!(err, BrokerError::SignOutFailed(_)));
        assert!(fx.token_cache.get().is_err());
        assert!(fx.creds_cache.get().is_err());
    }

    #[tokio::test]
    async fn logout_without_session_succeeds() {
        let fx = Fixture::new();
        let mut provider = MockIdentityProvider::new();
        provider.expect_global_sign_out().never();
        let resolver = fx.resolver(no_refresh(), MockIdentityPool::new(), Some(provider));

        resolver.logout().await.unwrap();
    }
}
