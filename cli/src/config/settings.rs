//! Broker configuration settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BrokerError, Result};

/// Main configuration for cogauth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// How the user authenticates and how tokens are refreshed.
    pub flow: LoginFlow,
    /// Cognito user pool and identity pool settings.
    pub cognito: CognitoConfig,
    /// OIDC provider settings, used when `flow = "oidc"`.
    pub oidc: OidcConfig,
    /// AWS console sign-in settings.
    pub console: ConsoleConfig,
    /// Token and credential cache settings.
    pub cache: CacheConfig,
    /// HTTP transport settings.
    pub http: HttpConfig,
}

/// Login flow used for interactive login and token refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFlow {
    /// Username and password against the Cognito user pool.
    #[default]
    UserPool,
    /// Authorization code flow against an OIDC provider (e.g. Google).
    Oidc,
}

/// Cognito settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitoConfig {
    /// AWS region hosting the pools.
    pub region: String,
    /// App client ID (user pool app client, or OIDC client).
    pub client_id: String,
    /// OIDC client secret. Not used by the user pool flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Identity pool ID, e.g. `ap-southeast-2:0000-...`.
    pub identity_pool_id: String,
    /// Login-map key for the identity pool, e.g.
    /// `cognito-idp.ap-southeast-2.amazonaws.com/ap-southeast-2_abc` or
    /// `accounts.google.com`.
    pub identity_provider_id: String,
}

impl Default for CognitoConfig {
    fn default() -> Self {
        Self {
            region: "ap-southeast-2".to_string(),
            client_id: String::new(),
            client_secret: None,
            identity_pool_id: String::new(),
            identity_provider_id: String::new(),
        }
    }
}

/// OIDC provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    /// Authorization endpoint.
    pub auth_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Redirect URL served by the local callback listener.
    pub redirect_url: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// How long to wait for the browser callback.
    pub callback_timeout_secs: u64,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            redirect_url: "http://localhost:8080".to_string(),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            callback_timeout_secs: 300,
        }
    }
}

/// AWS console sign-in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Issuer shown by AWS when the session ends.
    pub issuer: String,
    /// Console page to land on.
    pub destination: String,
    /// Console session lifetime in seconds.
    pub session_duration_secs: u32,
    /// AWS federation endpoint.
    pub federation_url: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            issuer: "cogauth".to_string(),
            destination: "https://console.aws.amazon.com/".to_string(),
            session_duration_secs: 43_200,
            federation_url: "https://signin.aws.amazon.com/federation".to_string(),
        }
    }
}

/// Where cached records live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// JSON files in the cache directory.
    #[default]
    File,
    /// OS keyring.
    Native,
}

impl TryFrom<&str> for StoreKind {
    type Error = BrokerError;

    fn try_from(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "native" | "keychain" => Ok(Self::Native),
            other => Err(BrokerError::Config(format!(
                "unknown credential store '{other}', expected 'file' or 'native'"
            ))),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend kind.
    pub store: StoreKind,
    /// Cache directory for the file backend. Defaults to the platform cache dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Keyring service holding the identity tokens.
    pub oauth_key: String,
    /// Keyring service holding the AWS credentials.
    pub aws_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::File,
            dir: None,
            oauth_key: "cogauth-oauth-tokens".to_string(),
            aws_key: "cogauth-aws-credentials".to_string(),
        }
    }
}

impl CacheConfig {
    /// Returns the configured cache directory or the platform default.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory is configured and the platform cache
    /// directory cannot be determined.
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => super::paths::cache_dir(),
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum number of retries for transient failures.
    pub max_retries: u32,
    /// Overrides the Cognito user pool endpoint (local stacks, tests).
    #[serde(with = "opt_url_serde", skip_serializing_if = "Option::is_none")]
    pub user_pool_endpoint: Option<Url>,
    /// Overrides the Cognito identity pool endpoint.
    #[serde(with = "opt_url_serde", skip_serializing_if = "Option::is_none")]
    pub identity_pool_endpoint: Option<Url>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            user_pool_endpoint: None,
            identity_pool_endpoint: None,
        }
    }
}

/// Custom serde module for optional URL fields.
mod opt_url_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use url::Url;

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(url: &Option<Url>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match url {
            Some(url) => serializer.serialize_str(url.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Url>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| Url::parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Environment variables that can override configuration.
pub mod env {
    pub const CONFIG: &str = "COGAUTH_CONFIG";
    pub const REGION: &str = "COGAUTH_REGION";
    pub const CACHE_DIR: &str = "COGAUTH_CACHE_DIR";
    pub const CREDS_STORE: &str = "COGAUTH_CREDS_STORE";
    pub const LOG_LEVEL: &str = "COGAUTH_LOG";
}

impl BrokerConfig {
    /// Apply environment variable overrides to the configuration.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(region) = lookup(env::REGION).filter(|r| !r.is_empty()) {
            self.cognito.region = region;
        }

        if let Some(dir) = lookup(env::CACHE_DIR).filter(|d| !d.is_empty()) {
            self.cache.dir = Some(PathBuf::from(dir));
        }

        if let Some(store) = lookup(env::CREDS_STORE) {
            if let Ok(kind) = StoreKind::try_from(store.as_str()) {
                self.cache.store = kind;
            }
        }

        self
    }

    /// Checks that the settings every command needs are present.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Config`] naming the first missing setting.
    pub fn validate(&self) -> Result<()> {
        if self.cognito.client_id.is_empty() {
            return Err(BrokerError::Config("not found: cognito.client_id".to_string()));
        }
        if self.cognito.identity_pool_id.is_empty() {
            return Err(BrokerError::Config(
                "not found: cognito.identity_pool_id".to_string(),
            ));
        }
        if self.cognito.identity_provider_id.is_empty() {
            return Err(BrokerError::Config(
                "not found: cognito.identity_provider_id".to_string(),
            ));
        }
        if self.cognito.region.is_empty() {
            return Err(BrokerError::Config("not found: cognito.region".to_string()));
        }
        if self.cache.store == StoreKind::Native
            && (self.cache.oauth_key.is_empty() || self.cache.aws_key.is_empty())
        {
            return Err(BrokerError::Config(
                "cache.oauth_key and cache.aws_key are required for the native store".to_string(),
            ));
        }
        Ok(())
    }
}
