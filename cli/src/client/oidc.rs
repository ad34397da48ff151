//! OIDC token endpoint transport.

use async_trait::async_trait;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, ExtraTokenFields,
    HttpRequest, HttpResponse, RedirectUrl, RefreshToken, RequestTokenError, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::tokens::IdentityTokens;
use crate::config::{CognitoConfig, OidcConfig};
use crate::error::{BrokerError, Result};

/// Extra token response fields: the OIDC ID token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
    /// Signed ID token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type OidcClient = oauth2::Client<
    BasicErrorResponse,
    OidcTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// OIDC token endpoint operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Builds the authorization URL and the CSRF state it carries.
    fn authorize_url(&self) -> (Url, String);

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<IdentityTokens>;

    /// Exchanges a refresh token for tokens.
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<IdentityTokens>;
}

/// [`TokenEndpoint`] implemented with the `oauth2` crate.
pub struct OAuth2TokenEndpoint {
    http: ClientWithMiddleware,
    client: OidcClient,
    scopes: Vec<Scope>,
}

impl OAuth2TokenEndpoint {
    /// Builds an endpoint from configuration.
    ///
    /// Token requests go through `http`, so they share its timeout, retry
    /// and logging middleware.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Config`] if an endpoint URL is invalid.
    pub fn new(http: ClientWithMiddleware, cognito: &CognitoConfig, oidc: &OidcConfig) -> Result<Self> {
        let auth_url = AuthUrl::new(oidc.auth_url.clone())
            .map_err(|e| BrokerError::Config(format!("Invalid auth URL: {e}")))?;
        let token_url = TokenUrl::new(oidc.token_url.clone())
            .map_err(|e| BrokerError::Config(format!("Invalid token URL: {e}")))?;
        let redirect_url = RedirectUrl::new(oidc.redirect_url.clone())
            .map_err(|e| BrokerError::Config(format!("Invalid redirect URL: {e}")))?;

        let client = OidcClient::new(
            ClientId::new(cognito.client_id.clone()),
            cognito.client_secret.clone().map(ClientSecret::new),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(redirect_url);

        Ok(Self {
            http,
            client,
            scopes: oidc.scopes.iter().cloned().map(Scope::new).collect(),
        })
    }
}

fn into_tokens(response: &OidcTokenResponse) -> Result<IdentityTokens> {
    let id_token = response
        .extra_fields()
        .id_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or(BrokerError::MissingIdentityAssertion)?;
    let expires_in = response
        .expires_in()
        .and_then(|d| i64::try_from(d.as_secs()).ok());

    Ok(IdentityTokens::from_expires_in(
        response.access_token().secret().clone(),
        response.refresh_token().map(|t| t.secret().clone()),
        id_token,
        expires_in,
    ))
}

/// Sends an `oauth2` request through the shared client.
///
/// `oauth2` carries its own `http` 0.2 types, so method, headers and status
/// are converted by name and bytes.
async fn send(http: ClientWithMiddleware, request: HttpRequest) -> Result<HttpResponse> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| BrokerError::Network(format!("invalid method: {e}")))?;

    let mut builder = http.request(method, request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_bytes());
    }
    let response = builder.body(request.body).send().await?;

    let status_code = oauth2::http::StatusCode::from_u16(response.status().as_u16())
        .map_err(|e| BrokerError::Network(format!("invalid status: {e}")))?;
    let mut headers = oauth2::http::HeaderMap::new();
    for (name, value) in response.headers() {
        if let (Ok(name), Ok(value)) = (
            oauth2::http::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            oauth2::http::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(name, value);
        }
    }
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn token_error(err: RequestTokenError<BrokerError, BasicErrorResponse>) -> BrokerError {
    match err {
        RequestTokenError::ServerResponse(response) => BrokerError::AuthFailed(response.to_string()),
        RequestTokenError::Request(e) => e,
        RequestTokenError::Parse(e, _) => {
            BrokerError::Serialization(format!("token endpoint response: {e}"))
        },
        RequestTokenError::Other(message) => BrokerError::AuthFailed(message),
    }
}

#[async_trait]
impl TokenEndpoint for OAuth2TokenEndpoint {
    fn authorize_url(&self) -> (Url, String) {
        let (url, state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned())
            .add_extra_param("access_type", "offline")
            .url();
        (url, state.secret().clone())
    }

    async fn exchange_code(&self, code: &str) -> Result<IdentityTokens> {
        tracing::debug!("exchanging authorization code");
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(|request| send(self.http.clone(), request))
            .await
            .map_err(token_error)?;
        into_tokens(&response)
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<IdentityTokens> {
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let response = self
            .client
            .exchange_refresh_token(&refresh_token)
            .request_async(|request| send(self.http.clone(), request))
            .await
            .map_err(token_error)?;
        into_tokens(&response)
    }
}
