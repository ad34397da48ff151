//! Cognito identity pool transport.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::tokens::AwsCredentials;
use crate::client::aws_json::AwsJsonClient;
use crate::error::{BrokerError, Result};

const TARGET_PREFIX: &str = "AWSCognitoIdentityService";

/// Login map: identity provider id to ID token.
pub type Logins = BTreeMap<String, String>;

/// Identity pool operations used for federation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityPool: Send + Sync {
    /// Resolves the identity id for the logins in `pool_id`.
    async fn get_id(&self, pool_id: &str, logins: &Logins) -> Result<String>;

    /// Mints temporary AWS credentials for `identity_id`.
    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        logins: &Logins,
    ) -> Result<AwsCredentials>;
}

/// [`IdentityPool`] backed by the Cognito Identity API.
pub struct CognitoIdentity {
    api: AwsJsonClient,
}

impl CognitoIdentity {
    /// Creates a client for `region`, or for `endpoint` when overridden.
    ///
    /// # Errors
    ///
    /// Returns an error if the regional endpoint URL is invalid.
    pub fn new(http: ClientWithMiddleware, region: &str, endpoint: Option<Url>) -> Result<Self> {
        let endpoint = match endpoint {
            Some(url) => url,
            None => Url::parse(&format!("https://cognito-identity.{region}.amazonaws.com/"))?,
        };
        Ok(Self {
            api: AwsJsonClient::new(http, endpoint, TARGET_PREFIX, "Cognito identity pool"),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdRequest<'a> {
    identity_pool_id: &'a str,
    logins: &'a Logins,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsRequest<'a> {
    identity_id: &'a str,
    logins: &'a Logins,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    credentials: Option<Credentials>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Credentials {
    access_key_id: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    /// Epoch seconds.
    expiration: Option<f64>,
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

#[async_trait]
impl IdentityPool for CognitoIdentity {
    async fn get_id(&self, pool_id: &str, logins: &Logins) -> Result<String> {
        let request = GetIdRequest {
            identity_pool_id: pool_id,
            logins,
        };
        let response: GetIdResponse = self.api.call("GetId", &request).await?;
        response
            .identity_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BrokerError::FederationFailed("GetId returned no identity id".to_string()))
    }

    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        logins: &Logins,
    ) -> Result<AwsCredentials> {
        let request = GetCredentialsRequest {
            identity_id,
            logins,
        };
        let response: GetCredentialsResponse =
            self.api.call("GetCredentialsForIdentity", &request).await?;
        let creds = response.credentials.ok_or_else(|| {
            BrokerError::FederationFailed("GetCredentialsForIdentity returned no credentials".to_string())
        })?;
        let expiry = creds
            .expiration
            .and_then(from_epoch_seconds)
            .ok_or_else(|| {
                BrokerError::FederationFailed("credentials have no valid expiration".to_string())
            })?;

        Ok(AwsCredentials {
            access_key: creds.access_key_id.unwrap_or_default(),
            secret_access_key: creds.secret_key.unwrap_or_default(),
            session_token: creds.session_token.unwrap_or_default(),
            expiry,
        })
    }
}
