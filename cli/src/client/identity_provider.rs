//! Cognito user pool transport.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::tokens::{ChallengeResponse, IdentityTokens};
use crate::client::aws_json::AwsJsonClient;
use crate::error::{BrokerError, Result};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

/// Provider error codes that mean the supplied credentials are unusable.
const AUTH_FAILURE_CODES: &[&str] = &[
    "NotAuthorizedException",
    "UserNotFoundException",
    "UserNotConfirmedException",
    "PasswordResetRequiredException",
];

/// Grant used to start authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFlow {
    /// `USER_PASSWORD_AUTH`.
    UserPassword {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// `REFRESH_TOKEN_AUTH`.
    RefreshToken {
        /// Refresh token from a previous login.
        refresh_token: String,
    },
}

/// Result of an authentication call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Tokens were issued.
    Authenticated(IdentityTokens),
    /// The provider requires another step first.
    Challenge(ChallengeResponse),
}

/// Where a password reset code was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeDelivery {
    /// Delivery medium, e.g. `EMAIL`.
    pub medium: String,
    /// Masked destination, e.g. `a***@e***`.
    pub destination: String,
}

/// Identity provider operations used by the broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Starts authentication with the given grant.
    async fn initiate_auth(&self, flow: AuthFlow) -> Result<AuthResult>;

    /// Answers a challenge returned by [`initiate_auth`](Self::initiate_auth).
    async fn respond_to_challenge(
        &self,
        challenge: &str,
        session: &str,
        responses: BTreeMap<String, String>,
    ) -> Result<AuthResult>;

    /// Revokes every token issued to the user.
    async fn global_sign_out(&self, access_token: &str) -> Result<()>;

    /// Sends a password reset code.
    async fn forgot_password(&self, username: &str) -> Result<CodeDelivery>;

    /// Sets a new password using a reset code.
    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        password: &str,
    ) -> Result<()>;
}

/// [`IdentityProvider`] backed by the Cognito user pool API.
pub struct CognitoIdentityProvider {
    api: AwsJsonClient,
    client_id: String,
}

impl CognitoIdentityProvider {
    /// Creates a provider for `region`, or for `endpoint` when overridden.
    ///
    /// # Errors
    ///
    /// Returns an error if the regional endpoint URL is invalid.
    pub fn new(
        http: ClientWithMiddleware,
        region: &str,
        endpoint: Option<Url>,
        client_id: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = match endpoint {
            Some(url) => url,
            None => Url::parse(&format!("https://cognito-idp.{region}.amazonaws.com/"))?,
        };
        Ok(Self {
            api: AwsJsonClient::new(http, endpoint, TARGET_PREFIX, "Cognito user pool"),
            client_id: client_id.into(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: BTreeMap<&'static str, &'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RespondToAuthChallengeRequest<'a> {
    challenge_name: &'a str,
    client_id: &'a str,
    session: &'a str,
    challenge_responses: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
    session: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GlobalSignOutRequest<'a> {
    access_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ForgotPasswordRequest<'a> {
    client_id: &'a str,
    username: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ForgotPasswordResponse {
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CodeDeliveryDetails {
    delivery_medium: Option<String>,
    destination: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmForgotPasswordRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    confirmation_code: &'a str,
    password: &'a str,
}

/// Empty response document.
#[derive(Deserialize)]
struct Empty {}

impl AuthResponse {
    fn into_result(self) -> Result<AuthResult> {
        if let Some(result) = self.authentication_result {
            let access_token = result.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
                BrokerError::AuthFailed("response did not include an access token".to_string())
            })?;
            let id_token = result
                .id_token
                .filter(|t| !t.is_empty())
                .ok_or(BrokerError::MissingIdentityAssertion)?;
            return Ok(AuthResult::Authenticated(IdentityTokens::from_expires_in(
                access_token,
                result.refresh_token,
                id_token,
                result.expires_in,
            )));
        }

        let Some(name) = self.challenge_name else {
            return Err(BrokerError::AuthFailed(
                "response contained neither tokens nor a challenge".to_string(),
            ));
        };
        // the session is the only way to answer a challenge
        let session = self.session.filter(|s| !s.is_empty()).ok_or_else(|| {
            BrokerError::AuthFailed(format!("{name} challenge returned without a session"))
        })?;
        Ok(AuthResult::Challenge(ChallengeResponse { name, session }))
    }
}

/// Maps credential rejections to [`BrokerError::AuthFailed`].
fn auth_error(err: BrokerError) -> BrokerError {
    match err {
        BrokerError::Provider { code, message, .. } if AUTH_FAILURE_CODES.contains(&code.as_str()) => {
            BrokerError::AuthFailed(if message.is_empty() { code } else { message })
        },
        other => other,
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn initiate_auth(&self, flow: AuthFlow) -> Result<AuthResult> {
        let (auth_flow, auth_parameters) = match &flow {
            AuthFlow::UserPassword { username, password } => (
                "USER_PASSWORD_AUTH",
                BTreeMap::from([("USERNAME", username.as_str()), ("PASSWORD", password.as_str())]),
            ),
            AuthFlow::RefreshToken { refresh_token } => (
                "REFRESH_TOKEN_AUTH",
                BTreeMap::from([("REFRESH_TOKEN", refresh_token.as_str())]),
            ),
        };
        tracing::debug!(auth_flow, "initiating user pool authentication");

        let request = InitiateAuthRequest {
            auth_flow,
            client_id: &self.client_id,
            auth_parameters,
        };
        let response: AuthResponse = self
            .api
            .call("InitiateAuth", &request)
            .await
            .map_err(auth_error)?;
        response.into_result()
    }

    async fn respond_to_challenge(
        &self,
        challenge: &str,
        session: &str,
        responses: BTreeMap<String, String>,
    ) -> Result<AuthResult> {
        let request = RespondToAuthChallengeRequest {
            challenge_name: challenge,
            client_id: &self.client_id,
            session,
            challenge_responses: responses,
        };
        let response: AuthResponse = self
            .api
            .call("RespondToAuthChallenge", &request)
            .await
            .map_err(auth_error)?;
        response.into_result()
    }

    async fn global_sign_out(&self, access_token: &str) -> Result<()> {
        let _: Empty = self
            .api
            .call("GlobalSignOut", &GlobalSignOutRequest { access_token })
            .await
            .map_err(auth_error)?;
        Ok(())
    }

    async fn forgot_password(&self, username: &str) -> Result<CodeDelivery> {
        let request = ForgotPasswordRequest {
            client_id: &self.client_id,
            username,
        };
        let response: ForgotPasswordResponse = self.api.call("ForgotPassword", &request).await?;
        Ok(response
            .code_delivery_details
            .map(|d| CodeDelivery {
                medium: d.delivery_medium.unwrap_or_default(),
                destination: d.destination.unwrap_or_default(),
            })
            .unwrap_or_default())
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        password: &str,
    ) -> Result<()> {
        let request = ConfirmForgotPasswordRequest {
            client_id: &self.client_id,
            username,
            confirmation_code: code,
            password,
        };
        let _: Empty = self.api.call("ConfirmForgotPassword", &request).await?;
        Ok(())
    }
}
