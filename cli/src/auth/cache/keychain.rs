//! Credential cache backed by the operating system keyring.
//!
//! - macOS: Keychain
//! - Linux: kernel keyutils (session keyring, cleared on logout or reboot)
//! - Windows: Credential Manager
//!
//! Records are stored as JSON under a service/account pair.

use std::marker::PhantomData;

use keyring::Entry;

use super::{decode, CachedRecord, CredentialStore, StoreError};

/// Stores one record in the OS keyring.
pub struct KeychainCache<T> {
    label: String,
    entry: Entry,
    _record: PhantomData<fn() -> T>,
}

impl<T: CachedRecord> KeychainCache<T> {
    /// Creates a keyring-backed cache.
    ///
    /// `label` only appears in error messages; the entry itself is keyed by
    /// `service` and `account`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the keyring entry cannot be created,
    /// which may occur if the keyring service is unavailable or locked.
    pub fn new(label: &str, service: &str, account: &str) -> Result<Self, StoreError> {
        let entry = Entry::new(service, account).map_err(|e| {
            StoreError::Unavailable(format!("Failed to open keyring entry for {label}: {e}"))
        })?;
        Ok(Self {
            label: label.to_string(),
            entry,
            _record: PhantomData,
        })
    }

    fn unavailable(&self, action: &str, err: &keyring::Error) -> StoreError {
        StoreError::Unavailable(format!(
            "Failed to {action} {} in the keyring: {err}. Ensure your system keyring is unlocked.",
            self.label
        ))
    }
}

impl<T: CachedRecord> CredentialStore<T> for KeychainCache<T> {
    fn get(&self) -> Result<T, StoreError> {
        match self.entry.get_password() {
            Ok(json) => decode(&json),
            Err(keyring::Error::NoEntry) => Err(StoreError::NotFound(T::KIND)),
            Err(e) => Err(self.unavailable("read", &e)),
        }
    }

    fn put(&self, record: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)
            .map_err(|e| StoreError::Unavailable(format!("Failed to serialize {}: {e}", T::KIND)))?;
        self.entry
            .set_password(&json)
            .map_err(|e| self.unavailable("save", &e))
    }

    fn delete(&self) -> Result<(), StoreError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(self.unavailable("delete", &e)),
        }
    }
}
