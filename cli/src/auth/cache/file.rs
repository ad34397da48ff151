//! File-backed credential cache.

use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::{decode, CachedRecord, CredentialStore, StoreError};

/// Stores one record as a pretty-printed JSON document.
pub struct FileCache<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: CachedRecord> FileCache<T> {
    /// Creates a cache backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// Creates a cache using the record's default file name inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(T::FILE_NAME))
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: CachedRecord> CredentialStore<T> for FileCache<T> {
    fn get(&self) -> Result<T, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => decode(&contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(T::KIND)),
            Err(e) => Err(StoreError::Unavailable(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn put(&self, record: &T) -> Result<(), StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Unavailable(format!("Failed to serialize {}: {e}", T::KIND)))?;
        fs::write(&self.path, json).map_err(|e| {
            StoreError::Unavailable(format!("Failed to write {}: {e}", self.path.display()))
        })?;
        restrict_permissions(&self.path)?;

        Ok(())
    }

    fn delete(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Unavailable(format!(
                "Failed to delete {}: {e}",
                self.path.display()
            ))),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        StoreError::Unavailable(format!(
            "Failed to set permissions on {}: {e}",
            path.display()
        ))
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
