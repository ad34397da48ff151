//! ID token to AWS credentials exchange.

use std::sync::Arc;

use crate::auth::tokens::AwsCredentials;
use crate::client::{IdentityPool, Logins};
use crate::error::{BrokerError, Result};

/// Exchanges an ID token for temporary AWS credentials through the
/// identity pool (`GetId` then `GetCredentialsForIdentity`).
#[derive(Clone)]
pub struct FederationExchanger {
    pool: Arc<dyn IdentityPool>,
    identity_pool_id: String,
    identity_provider_id: String,
}

impl FederationExchanger {
    pub fn new(
        pool: Arc<dyn IdentityPool>,
        identity_pool_id: impl Into<String>,
        identity_provider_id: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            identity_pool_id: identity_pool_id.into(),
            identity_provider_id: identity_provider_id.into(),
        }
    }

    /// Performs the exchange. Nothing is retried here.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::FederationFailed`] naming the failing call.
    pub async fn exchange(&self, id_token: &str) -> Result<AwsCredentials> {
        let logins = Logins::from([(self.identity_provider_id.clone(), id_token.to_string())]);

        let identity_id = self
            .pool
            .get_id(&self.identity_pool_id, &logins)
            .await
            .map_err(|e| federation_error("GetId", e))?;
        tracing::debug!(%identity_id, "resolved identity");

        let credentials = self
            .pool
            .get_credentials_for_identity(&identity_id, &logins)
            .await
            .map_err(|e| federation_error("GetCredentialsForIdentity", e))?;

        credentials
            .validate()
            .map_err(|reason| BrokerError::FederationFailed(format!("incomplete credentials, {reason}")))?;

        tracing::info!(expiry = %credentials.expiry, "obtained aws credentials");
        Ok(credentials)
    }
}

fn federation_error(step: &str, err: BrokerError) -> BrokerError {
    match err {
        BrokerError::FederationFailed(_) => err,
        other => BrokerError::FederationFailed(format!("{step}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::identity_pool::MockIdentityPool;
    use chrono::{Duration, Utc};

    fn credentials() -> AwsCredentials {
        AwsCredentials {
            access_key: "ASIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "session".to_string(),
            expiry: Utc::now() + Duration::hours(1),
        }
    }

    fn expected_logins(logins: &Logins) -> bool {
        logins.len() == 1 && logins.get("accounts.google.com").map(String::as_str) == Some("I1")
    }

    #[tokio::test]
    async fn exchange_uses_the_same_logins_for_both_calls() {
        let mut pool = MockIdentityPool::new();
        pool.expect_get_id()
            .withf(|pool_id, logins| pool_id == "ap-southeast-2:pool" && expected_logins(logins))
            .times(1)
            .returning(|_, _| Ok("identity-1".to_string()));
        pool.expect_get_credentials_for_identity()
            .withf(|id, logins| id == "identity-1" && expected_logins(logins))
            .times(1)
            .returning(|_, _| Ok(credentials()));

        let exchanger =
            FederationExchanger::new(Arc::new(pool), "ap-southeast-2:pool", "accounts.google.com");
        let creds = exchanger.exchange("I1").await.unwrap();
        assert_eq!(creds.access_key, "ASIAEXAMPLE");
    }

    #[tokio::test]
    async fn get_id_failure_aborts() {
        let mut pool = MockIdentityPool::new();
        pool.expect_get_id()
            .returning(|_, _| Err(BrokerError::Network("connection reset".to_string())));
        pool.expect_get_credentials_for_identity().never();

        let exchanger = FederationExchanger::new(Arc::new(pool), "pool", "accounts.google.com");
        let err = exchanger.exchange("I1").await.unwrap_err();

        match err {
            BrokerError::FederationFailed(message) => {
                assert!(message.starts_with("GetId"));
                assert!(message.contains("connection reset"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn incomplete_credentials_are_rejected() {
        let mut pool = MockIdentityPool::new();
        pool.expect_get_id().returning(|_, _| Ok("identity-1".to_string()));
        pool.expect_get_credentials_for_identity().returning(|_, _| {
            let mut creds = credentials();
            creds.session_token = String::new();
            Ok(creds)
        });

        let exchanger = FederationExchanger::new(Arc::new(pool), "pool", "accounts.google.com");
        let err = exchanger.exchange("I1").await.unwrap_err();
        assert!(matches!(err, BrokerError::FederationFailed(ref m) if m.contains("session_token")));
    }
}
