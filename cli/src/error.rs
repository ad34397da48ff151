//! Error types and result aliases for cogauth.
//!
//! Every failure carries the resolution stage it came from (token load,
//! token refresh, federation exchange, credential persist) so a single
//! top-level message identifies what went wrong and what to run next.

use thiserror::Error;

use crate::auth::cache::StoreError;

/// Main error type for broker operations.
///
/// Use [`requires_reauth`](Self::requires_reauth) and
/// [`is_retriable`](Self::is_retriable) to decide how the CLI reacts.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// No usable identity tokens are cached.
    #[error("Not logged in ({0}). Run 'cogauth login' to authenticate.")]
    NoSession(#[source] StoreError),

    /// The identity provider rejected the credentials or refresh token.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// A token response did not include an ID token.
    #[error("The identity provider did not return an ID token. Check that the 'openid' scope is granted.")]
    MissingIdentityAssertion,

    /// Refreshing the identity tokens failed.
    #[error("Token refresh failed. Run 'cogauth login' to re-authenticate. Details: {0}")]
    RefreshFailed(#[source] Box<BrokerError>),

    /// Exchanging the ID token for AWS credentials failed.
    #[error("Federation exchange failed: {0}")]
    FederationFailed(String),

    /// Resolving fresh AWS credentials failed.
    #[error("Could not refresh cloud credentials: {0}")]
    CredentialsRefresh(#[source] Box<BrokerError>),

    /// Answering an authentication challenge failed.
    #[error("Could not complete the '{name}' challenge: {message}")]
    ChallengeFailed {
        /// Challenge name.
        name: String,
        /// Provider message.
        message: String,
    },

    /// The login flow returned a challenge this tool cannot answer.
    #[error("Unsupported authentication challenge '{0}'.")]
    UnsupportedChallenge(String),

    /// Provider-side global sign-out failed. Local state was still cleared.
    #[error("Remote sign-out failed, local credentials were removed: {0}")]
    SignOutFailed(String),

    /// Forgot/confirm password call failed.
    #[error("Password reset failed: {0}")]
    PasswordResetFailed(String),

    /// The OIDC redirect could not be received or was invalid.
    #[error("Login callback failed: {0}")]
    Callback(String),

    /// A credential cache could not be read or written.
    #[error("Failed to {stage}: {source}. Check the cache directory or keyring.")]
    Store {
        /// What the broker was doing.
        stage: &'static str,
        /// The store failure.
        #[source]
        source: StoreError,
    },

    /// An AWS service returned an error the broker does not map further.
    #[error("{service} returned {code}: {message}")]
    Provider {
        /// Service name.
        service: &'static str,
        /// AWS error code (`__type` without the namespace).
        code: String,
        /// Error message.
        message: String,
    },

    /// Service is unreachable (5xx or connection failure).
    #[error("Service is unavailable. Check your network connection or try again later.")]
    ServiceUnavailable,

    /// Request timed out.
    #[error("Request timed out. The server may be slow or unreachable. Try again later.")]
    Timeout,

    /// Network error during HTTP request.
    #[error("Network error: {0}. Check your internet connection.")]
    Network(String),

    /// General configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}. Check file permissions and format.")]
    ConfigRead(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Data serialization error: {0}")]
    Serialization(String),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Interactive prompt failed or was cancelled.
    #[error("Prompt failed: {0}")]
    Prompt(String),
}

impl BrokerError {
    /// Wraps a store failure with the stage that hit it.
    #[must_use]
    pub const fn store(stage: &'static str, source: StoreError) -> Self {
        Self::Store { stage, source }
    }

    /// Checks if this error can only be resolved by logging in again.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        match self {
            Self::NoSession(_) | Self::AuthFailed(_) | Self::MissingIdentityAssertion => true,
            Self::RefreshFailed(inner) | Self::CredentialsRefresh(inner) => inner.requires_reauth(),
            _ => false,
        }
    }

    /// Checks if this error is transient and the operation might succeed on retry.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Network(_)
            | Self::Timeout
            | Self::ServiceUnavailable
            | Self::FederationFailed(_)
            | Self::Store { .. } => true,
            Self::RefreshFailed(inner) | Self::CredentialsRefresh(inner) => inner.is_retriable(),
            _ => false,
        }
    }
}

/// Result type alias using [`BrokerError`].
pub type Result<T> = std::result::Result<T, BrokerError>;

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::ServiceUnavailable
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for BrokerError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Self::Network(e.to_string()),
        }
    }
}

impl From<inquire::InquireError> for BrokerError {
    fn from(err: inquire::InquireError) -> Self {
        Self::Prompt(err.to_string())
    }
}
