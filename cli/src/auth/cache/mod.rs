//! Persistent caches for identity tokens and AWS credentials.
//!
//! This module provides the storage capability the resolvers depend on:
//! - [`CredentialStore`] - Get/Put/Delete for one typed record
//! - [`FileCache`] - JSON document in the cache directory
//! - [`KeychainCache`] - OS keyring entry
//! - [`CacheStore`] - the backend selected from configuration

pub mod error;
pub mod file;
pub mod keychain;

pub use error::StoreError;
pub use file::FileCache;
pub use keychain::KeychainCache;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::tokens::{AwsCredentials, IdentityTokens};
use crate::config::{CacheConfig, StoreKind};
use crate::error::{BrokerError, Result};

/// A record type that can be cached.
pub trait CachedRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human-readable name used in errors and logs.
    const KIND: &'static str;
    /// File name used by the file backend.
    const FILE_NAME: &'static str;

    /// Structural validation applied on every read.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    fn validate(&self) -> std::result::Result<(), String>;
}

impl CachedRecord for IdentityTokens {
    const KIND: &'static str = "oauth tokens";
    const FILE_NAME: &'static str = "oauth_tokens.json";

    fn validate(&self) -> std::result::Result<(), String> {
        Self::validate(self)
    }
}

impl CachedRecord for AwsCredentials {
    const KIND: &'static str = "aws credentials";
    const FILE_NAME: &'static str = "aws_credentials.json";

    fn validate(&self) -> std::result::Result<(), String> {
        Self::validate(self)
    }
}

/// Storage capability for a single cached record.
pub trait CredentialStore<T>: Send + Sync {
    /// Loads the record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if nothing is stored,
    /// [`StoreError::Corrupt`] if the stored record is invalid, or
    /// [`StoreError::Unavailable`] if the backend cannot be read.
    fn get(&self) -> std::result::Result<T, StoreError>;

    /// Saves the record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be written.
    fn put(&self, record: &T) -> std::result::Result<(), StoreError>;

    /// Removes the record. Succeeds if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the removal fails.
    fn delete(&self) -> std::result::Result<(), StoreError>;
}

/// Cache backend chosen at startup.
pub enum CacheStore<T> {
    /// JSON file in the cache directory.
    File(FileCache<T>),
    /// OS keyring entry.
    Keychain(KeychainCache<T>),
}

impl<T: CachedRecord> CacheStore<T> {
    /// Opens the configured backend for `T`.
    ///
    /// `keychain_service` names the keyring service holding the record when
    /// the native store is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be determined or the
    /// keyring entry cannot be created.
    pub fn open(config: &CacheConfig, keychain_service: &str) -> Result<Self> {
        match config.store {
            StoreKind::File => Ok(Self::File(FileCache::in_dir(&config.resolve_dir()?))),
            StoreKind::Native => Ok(Self::Keychain(KeychainCache::new(
                T::KIND,
                keychain_service,
                &whoami::username(),
            )
            .map_err(|e| BrokerError::store("open keyring entry", e))?)),
        }
    }
}

impl<T: CachedRecord> CredentialStore<T> for CacheStore<T> {
    fn get(&self) -> std::result::Result<T, StoreError> {
        match self {
            Self::File(cache) => cache.get(),
            Self::Keychain(cache) => cache.get(),
        }
    }

    fn put(&self, record: &T) -> std::result::Result<(), StoreError> {
        match self {
            Self::File(cache) => cache.put(record),
            Self::Keychain(cache) => cache.put(record),
        }
    }

    fn delete(&self) -> std::result::Result<(), StoreError> {
        match self {
            Self::File(cache) => cache.delete(),
            Self::Keychain(cache) => cache.delete(),
        }
    }
}

/// Opens the identity token cache.
///
/// # Errors
///
/// See [`CacheStore::open`].
pub fn token_cache(config: &CacheConfig) -> Result<CacheStore<IdentityTokens>> {
    CacheStore::open(config, &config.oauth_key)
}

/// Opens the AWS credentials cache.
///
/// # Errors
///
/// See [`CacheStore::open`].
pub fn credentials_cache(config: &CacheConfig) -> Result<CacheStore<AwsCredentials>> {
    CacheStore::open(config, &config.aws_key)
}

/// Parses and validates a serialized record.
pub(crate) fn decode<T: CachedRecord>(raw: &str) -> std::result::Result<T, StoreError> {
    let record: T = serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        kind: T::KIND,
        reason: e.to_string(),
    })?;
    record.validate().map_err(|reason| StoreError::Corrupt {
        kind: T::KIND,
        reason,
    })?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn file_config(dir: &TempDir) -> CacheConfig {
        CacheConfig {
            store: StoreKind::File,
            dir: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        }
    }

    #[test]
    fn decode_rejects_invalid_json_as_corrupt() {
        let err = decode::<IdentityTokens>("not json").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { kind: "oauth tokens", .. }));
    }

    #[test]
    fn decode_rejects_records_failing_validation() {
        let raw = r#"{"access_key":"","secret_access_key":"s","session_token":"t","expiry":"2030-01-01T00:00:00Z"}"#;
        let err = decode::<AwsCredentials>(raw).unwrap_err();
        assert!(err.is_missing());
        assert!(err.to_string().contains("access_key"));
    }

    #[test]
    fn decode_accepts_missing_refresh_token() {
        let raw = r#"{"access_token":"a","id_token":"i","expiry":"2030-01-01T00:00:00Z"}"#;
        let tokens = decode::<IdentityTokens>(raw).unwrap();
        assert!(tokens.refresh_token.is_empty());
    }

    #[test]
    fn serialized_field_names_are_stable() {
        let expiry: DateTime<Utc> = "2030-01-01T00:00:00Z".parse().unwrap();
        let creds = AwsCredentials {
            access_key: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "session".to_string(),
            expiry,
        };
        let json = serde_json::to_value(&creds).unwrap();
        assert_eq!(json["access_key"], "AKIA");
        assert_eq!(json["secret_access_key"], "secret");
        assert_eq!(json["session_token"], "session");
        assert_eq!(json["expiry"], "2030-01-01T00:00:00Z");
    }

    #[test]
    fn open_file_backend_uses_record_file_names() {
        let dir = TempDir::new().unwrap();
        let config = file_config(&dir);

        let tokens = token_cache(&config).unwrap();
        let creds = credentials_cache(&config).unwrap();

        match (tokens, creds) {
            (CacheStore::File(t), CacheStore::File(c)) => {
                assert_eq!(t.path(), dir.path().join("oauth_tokens.json"));
                assert_eq!(c.path(), dir.path().join("aws_credentials.json"));
            },
            _ => panic!("expected file backends"),
        }
    }
}
