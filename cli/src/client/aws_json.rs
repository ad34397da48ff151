//! Minimal AWS JSON 1.1 protocol client.
//!
//! The Cognito user pool and identity pool operations used here are
//! unsigned, so a plain POST with the `X-Amz-Target` header is enough.

use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BrokerError, Result};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Client for one AWS JSON 1.1 service endpoint.
#[derive(Clone)]
pub struct AwsJsonClient {
    http: ClientWithMiddleware,
    endpoint: Url,
    target_prefix: &'static str,
    service: &'static str,
}

/// Error document returned by AWS JSON services.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

impl AwsJsonClient {
    /// Creates a client.
    ///
    /// `target_prefix` is the service's target namespace, e.g.
    /// `AWSCognitoIdentityProviderService`. `service` names the service in errors.
    pub fn new(
        http: ClientWithMiddleware,
        endpoint: Url,
        target_prefix: &'static str,
        service: &'static str,
    ) -> Self {
        Self {
            http,
            endpoint,
            target_prefix,
            service,
        }
    }

    #[cfg(test)]
    pub(crate) const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Invokes `action` with `input` and decodes the response.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Provider`] for service errors,
    /// [`BrokerError::ServiceUnavailable`] for 5xx responses without an
    /// error code, and transport errors otherwise.
    pub async fn call<I, O>(&self, action: &str, input: &I) -> Result<O>
    where
        I: Serialize + Sync + ?Sized,
        O: DeserializeOwned,
    {
        let body = serde_json::to_vec(input)?;

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", format!("{}.{action}", self.target_prefix))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(self.error_from(status, &bytes));
        }

        let raw: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };
        serde_json::from_slice(raw).map_err(|e| {
            BrokerError::Serialization(format!("{} {action} response: {e}", self.service))
        })
    }

    fn error_from(&self, status: StatusCode, bytes: &[u8]) -> BrokerError {
        let body: ErrorBody = serde_json::from_slice(bytes).unwrap_or_default();

        match body.kind {
            Some(kind) => BrokerError::Provider {
                service: self.service,
                code: error_code(&kind).to_string(),
                message: body.message.unwrap_or_default(),
            },
            None if status.is_server_error() => BrokerError::ServiceUnavailable,
            None => BrokerError::Provider {
                service: self.service,
                code: status.as_u16().to_string(),
                message: body
                    .message
                    .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned()),
            },
        }
    }
}

/// Strips the namespace from an `__type` value.
///
/// `com.amazonaws.cognito#NotAuthorizedException` becomes
/// `NotAuthorizedException`.
fn error_code(kind: &str) -> &str {
    let code = kind.rsplit('#').next().unwrap_or(kind);
    code.split(':').next().unwrap_or(code)
}
