//! Interactive login and the challenge state machine.
//!
//! ```text
//! Unauthenticated ──login──▶ Authenticated
//!        │                        ▲
//!        └─challenge─▶ AwaitingChallengeResponse ──complete_challenge──┘
//! ```
//!
//! No console I/O happens here. The caller prompts for challenge answers
//! and feeds them back through [`LoginHandler::complete_challenge`].

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;

use crate::auth::cache::CredentialStore;
use crate::auth::credentials_resolver::CredentialsResolver;
use crate::auth::tokens::{AwsCredentials, ChallengeResponse, IdentityTokens, NEW_PASSWORD_REQUIRED};
use crate::client::{AuthFlow, AuthResult, IdentityProvider, TokenEndpoint};
use crate::error::{BrokerError, Result};

/// Where a login attempt currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginState {
    #[default]
    Unauthenticated,
    AwaitingChallengeResponse,
    Authenticated,
}

/// Result of a login step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Tokens and AWS credentials are stored.
    Authenticated(AwsCredentials),
    /// The provider needs an answer before issuing tokens. Nothing was stored.
    Challenge(ChallengeResponse),
}

/// The credential source a login starts from.
pub enum Authenticator {
    /// Cognito user pool username/password.
    UserPool(Arc<dyn IdentityProvider>),
    /// OIDC authorization code flow.
    Oidc(Arc<dyn TokenEndpoint>),
}

pub struct LoginHandler {
    authenticator: Authenticator,
    token_cache: Arc<dyn CredentialStore<IdentityTokens>>,
    credentials: CredentialsResolver,
    state: LoginState,
}

impl LoginHandler {
    pub fn new(
        authenticator: Authenticator,
        token_cache: Arc<dyn CredentialStore<IdentityTokens>>,
        credentials: CredentialsResolver,
    ) -> Self {
        Self {
            authenticator,
            token_cache,
            credentials,
            state: LoginState::default(),
        }
    }

    pub const fn state(&self) -> LoginState {
        self.state
    }

    /// Builds the OIDC authorization URL and its CSRF state.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Config`] when the user pool flow is configured.
    pub fn authorization_request(&self) -> Result<(Url, String)> {
        match &self.authenticator {
            Authenticator::Oidc(endpoint) => Ok(endpoint.authorize_url()),
            Authenticator::UserPool(_) => Err(wrong_flow("oidc")),
        }
    }

    /// Logs in with a user pool username and password.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::AuthFailed`] if the credentials are rejected,
    /// or the federation/store error that stopped the bootstrap.
    pub async fn login_with_password(&mut self, username: &str, password: &str) -> Result<LoginOutcome> {
        let Authenticator::UserPool(provider) = &self.authenticator else {
            return Err(wrong_flow("user_pool"));
        };

        let flow = AuthFlow::UserPassword {
            username: username.to_string(),
            password: password.to_string(),
        };
        let result = provider.initiate_auth(flow).await?;
        match result {
            AuthResult::Authenticated(tokens) => self.bootstrap(tokens).await,
            AuthResult::Challenge(challenge) => Ok(self.await_challenge(challenge)),
        }
    }

    /// Logs in with an OIDC authorization code.
    ///
    /// # Errors
    ///
    /// Returns the token endpoint error, or the federation/store error that
    /// stopped the bootstrap.
    pub async fn login_with_code(&mut self, code: &str) -> Result<LoginOutcome> {
        let Authenticator::Oidc(endpoint) = &self.authenticator else {
            return Err(wrong_flow("oidc"));
        };

        let tokens = endpoint.exchange_code(code).await?;
        self.bootstrap(tokens).await
    }

    /// Answers the forced password change challenge.
    ///
    /// On failure the handler stays in
    /// [`LoginState::AwaitingChallengeResponse`] so the caller can retry.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ChallengeFailed`] if the provider rejects the answer.
    pub async fn complete_challenge(
        &mut self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> Result<LoginOutcome> {
        let Authenticator::UserPool(provider) = &self.authenticator else {
            return Err(wrong_flow("user_pool"));
        };

        let responses = BTreeMap::from([
            ("USERNAME".to_string(), username.to_string()),
            ("NEW_PASSWORD".to_string(), new_password.to_string()),
        ]);
        let result = provider
            .respond_to_challenge(NEW_PASSWORD_REQUIRED, session, responses)
            .await
            .map_err(|e| BrokerError::ChallengeFailed {
                name: NEW_PASSWORD_REQUIRED.to_string(),
                message: e.to_string(),
            })?;

        match result {
            AuthResult::Authenticated(tokens) => self.bootstrap(tokens).await,
            AuthResult::Challenge(challenge) => Ok(self.await_challenge(challenge)),
        }
    }

    fn await_challenge(&mut self, challenge: ChallengeResponse) -> LoginOutcome {
        tracing::info!(challenge = %challenge.name, "login requires a challenge response");
        self.state = LoginState::AwaitingChallengeResponse;
        LoginOutcome::Challenge(challenge)
    }

    async fn bootstrap(&mut self, tokens: IdentityTokens) -> Result<LoginOutcome> {
        self.token_cache
            .put(&tokens)
            .map_err(|e| BrokerError::store("persist oauth tokens", e))?;
        self.state = LoginState::Authenticated;
        tracing::info!(expiry = %tokens.expiry, "logged in");

        let creds = self.credentials.federate(&tokens.id_token).await?;
        Ok(LoginOutcome::Authenticated(creds))
    }
}

fn wrong_flow(expected: &str) -> BrokerError {
    BrokerError::Config(format!("this command needs flow = \"{expected}\" in the configuration"))
}
