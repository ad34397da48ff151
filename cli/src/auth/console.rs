//! AWS management console sign-in links.

use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::tokens::AwsCredentials;
use crate::config::ConsoleConfig;
use crate::error::{BrokerError, Result};

/// Builds federated console login URLs from temporary credentials.
pub struct ConsoleSignin {
    http: ClientWithMiddleware,
    federation_url: Url,
    issuer: String,
    destination: String,
    session_duration_secs: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Session<'a> {
    session_id: &'a str,
    session_key: &'a str,
    session_token: &'a str,
}

#[derive(Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: Option<String>,
}

impl ConsoleSignin {
    /// # Errors
    ///
    /// Returns an error if the federation URL is invalid.
    pub fn new(http: ClientWithMiddleware, config: &ConsoleConfig) -> Result<Self> {
        Ok(Self {
            http,
            federation_url: Url::parse(&config.federation_url)?,
            issuer: config.issuer.clone(),
            destination: config.destination.clone(),
            session_duration_secs: config.session_duration_secs,
        })
    }

    /// Exchanges `creds` for a sign-in token and returns the login URL.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or [`BrokerError::FederationFailed`] if
    /// the endpoint returns no token.
    pub async fn sign_in_link(&self, creds: &AwsCredentials) -> Result<Url> {
        let session = serde_json::to_string(&Session {
            session_id: &creds.access_key,
            session_key: &creds.secret_access_key,
            session_token: &creds.session_token,
        })?;

        let mut token_url = self.federation_url.clone();
        token_url
            .query_pairs_mut()
            .append_pair("Action", "getSigninToken")
            .append_pair("SessionDuration", &self.session_duration_secs.to_string())
            .append_pair("Session", &session);

        let response = self.http.get(token_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BrokerError::FederationFailed(format!(
                "sign-in token request returned {status}"
            )));
        }
        let body: SigninTokenResponse = response.json().await?;
        let token = body
            .signin_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BrokerError::FederationFailed("no sign-in token returned".to_string()))?;

        let mut login_url = self.federation_url.clone();
        login_url
            .query_pairs_mut()
            .append_pair("Action", "login")
            .append_pair("Issuer", &self.issuer)
            .append_pair("Destination", &self.destination)
            .append_pair("SigninToken", &token);
        Ok(login_url)
    }
}
