//! Builds the resolver graph for one invocation from [`BrokerConfig`].

use std::sync::Arc;

use reqwest_middleware::ClientWithMiddleware;

use crate::auth::cache::{self, CredentialStore};
use crate::auth::console::ConsoleSignin;
use crate::auth::credentials_resolver::CredentialsResolver;
use crate::auth::federation::FederationExchanger;
use crate::auth::login::{Authenticator, LoginHandler};
use crate::auth::password_reset::PasswordResetter;
use crate::auth::refresher::{OidcRefresher, Refresher, UserPoolRefresher};
use crate::auth::resolver::TokensResolver;
use crate::auth::tokens::{AwsCredentials, IdentityTokens};
use crate::client::{
    build_http_client, CognitoIdentity, CognitoIdentityProvider, IdentityPool, IdentityProvider,
    OAuth2TokenEndpoint, TokenEndpoint,
};
use crate::config::{BrokerConfig, LoginFlow};
use crate::error::Result;

/// Owns the caches and transports selected by configuration.
pub struct Broker {
    config: BrokerConfig,
    http: ClientWithMiddleware,
    token_cache: Arc<dyn CredentialStore<IdentityTokens>>,
    creds_cache: Arc<dyn CredentialStore<AwsCredentials>>,
    user_pool: Arc<dyn IdentityProvider>,
    identity_pool: Arc<dyn IdentityPool>,
    oidc: Option<Arc<dyn TokenEndpoint>>,
}

impl Broker {
    /// Validates `config` and opens the configured caches and transports.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, or an error opening a cache backend.
    pub fn from_config(config: BrokerConfig) -> Result<Self> {
        config.validate()?;

        let http = build_http_client(&config.http)?;
        let token_cache: Arc<dyn CredentialStore<IdentityTokens>> =
            Arc::new(cache::token_cache(&config.cache)?);
        let creds_cache: Arc<dyn CredentialStore<AwsCredentials>> =
            Arc::new(cache::credentials_cache(&config.cache)?);

        let user_pool: Arc<dyn IdentityProvider> = Arc::new(CognitoIdentityProvider::new(
            http.clone(),
            &config.cognito.region,
            config.http.user_pool_endpoint.clone(),
            config.cognito.client_id.clone(),
        )?);
        let identity_pool: Arc<dyn IdentityPool> = Arc::new(CognitoIdentity::new(
            http.clone(),
            &config.cognito.region,
            config.http.identity_pool_endpoint.clone(),
        )?);
        let oidc: Option<Arc<dyn TokenEndpoint>> = match config.flow {
            LoginFlow::Oidc => Some(Arc::new(OAuth2TokenEndpoint::new(
                http.clone(),
                &config.cognito,
                &config.oidc,
            )?)),
            LoginFlow::UserPool => None,
        };

        tracing::debug!(flow = ?config.flow, store = ?config.cache.store, "broker configured");
        Ok(Self {
            config,
            http,
            token_cache,
            creds_cache,
            user_pool,
            identity_pool,
            oidc,
        })
    }

    pub const fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn refresher(&self) -> Refresher {
        match &self.oidc {
            Some(endpoint) => Refresher::Oidc(OidcRefresher::new(endpoint.clone(), self.token_cache.clone())),
            None => Refresher::UserPool(UserPoolRefresher::new(
                self.user_pool.clone(),
                self.token_cache.clone(),
            )),
        }
    }

    /// Token resolver using the configured refresh grant.
    pub fn tokens_resolver(&self) -> TokensResolver {
        TokensResolver::new(self.token_cache.clone(), Arc::new(self.refresher()))
    }

    /// Credentials resolver. Global sign-out is only wired for the user pool flow.
    pub fn credentials_resolver(&self) -> CredentialsResolver {
        let federation = FederationExchanger::new(
            self.identity_pool.clone(),
            self.config.cognito.identity_pool_id.clone(),
            self.config.cognito.identity_provider_id.clone(),
        );
        let sign_out = self.oidc.is_none().then(|| self.user_pool.clone());
        CredentialsResolver::new(self.creds_cache.clone(), self.tokens_resolver(), federation, sign_out)
    }

    pub fn login_handler(&self) -> LoginHandler {
        let authenticator = match &self.oidc {
            Some(endpoint) => Authenticator::Oidc(endpoint.clone()),
            None => Authenticator::UserPool(self.user_pool.clone()),
        };
        LoginHandler::new(authenticator, self.token_cache.clone(), self.credentials_resolver())
    }

    pub fn password_resetter(&self) -> PasswordResetter {
        PasswordResetter::new(self.user_pool.clone())
    }

    /// # Errors
    ///
    /// Returns an error if the console federation URL is invalid.
    pub fn console_signin(&self) -> Result<ConsoleSignin> {
        ConsoleSignin::new(self.http.clone(), &self.config.console)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::login::LoginOutcome;
    use crate::config::{CacheConfig, CognitoConfig, HttpConfig, StoreKind};
    use crate::error::BrokerError;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(dir: &TempDir, server: &MockServer) -> BrokerConfig {
        let endpoint: url::Url = server.uri().parse().unwrap();
        BrokerConfig {
            cognito: CognitoConfig {
                client_id: "client-1".to_string(),
                identity_pool_id: "ap-southeast-2:pool".to_string(),
                identity_provider_id: "cognito-idp.ap-southeast-2.amazonaws.com/pool_1".to_string(),
                ..CognitoConfig::default()
            },
            cache: CacheConfig {
                store: StoreKind::File,
                dir: Some(dir.path().to_path_buf()),
                ..CacheConfig::default()
            },
            http: HttpConfig {
                max_retries: 0,
                user_pool_endpoint: Some(endpoint.clone()),
                identity_pool_endpoint: Some(endpoint),
                ..HttpConfig::default()
            },
            ..BrokerConfig::default()
        }
    }

    async fn mount_federation(server: &MockServer) {
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AWSCognitoIdentityService.GetId"))
            .and(body_partial_json(json!({
                "Logins": {"cognito-idp.ap-southeast-2.amazonaws.com/pool_1": "I1"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"IdentityId": "identity-1"})))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(header(
                "x-amz-target",
                "AWSCognitoIdentityService.GetCredentialsForIdentity",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Credentials": {
                    "AccessKeyId": "ASIA1",
                    "SecretKey": "secret",
                    "SessionToken": "session",
                    "Expiration": 4_102_444_800_i64
                }
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn rejects_incomplete_configuration() {
        let err = Broker::from_config(BrokerConfig::default()).err().unwrap();
        assert!(matches!(err, BrokerError::Config(_)));
    }

    #[tokio::test]
    async fn password_login_then_resolve_then_logout() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AWSCognitoIdentityProviderService.InitiateAuth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "AuthenticationResult": {
                    "AccessToken": "A1",
                    "IdToken": "I1",
                    "RefreshToken": "R1",
                    "ExpiresIn": 3600
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AWSCognitoIdentityProviderService.GlobalSignOut"))
            .and(body_partial_json(json!({"AccessToken": "A1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        mount_federation(&server).await;

        let broker = Broker::from_config(config(&dir, &server)).unwrap();

        let outcome = broker
            .login_handler()
            .login_with_password("alice", "hunter2")
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(ref c) if c.access_key == "ASIA1"));

        let resolver = broker.credentials_resolver();
        let creds = resolver.get_aws_credentials().await.unwrap();
        assert_eq!(creds.access_key, "ASIA1");

        resolver.logout().await.unwrap();
        assert!(resolver.tokens().get_tokens().await.unwrap_err().requires_reauth());
        assert!(!dir.path().join("aws_credentials.json").exists());
    }
}
