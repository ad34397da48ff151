//! Credential cache error types.

use thiserror::Error;

/// Errors returned by a [`CredentialStore`](super::CredentialStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Nothing has been written yet.
    #[error("no {0} are stored")]
    NotFound(&'static str),

    /// A record exists but cannot be parsed or fails validation.
    #[error("stored {kind} are corrupt: {reason}")]
    Corrupt {
        /// The kind of record.
        kind: &'static str,
        /// Why the record was rejected.
        reason: String,
    },

    /// The file system or OS keyring could not be used.
    #[error("{0}")]
    Unavailable(String),
}

impl StoreError {
    /// Checks if the record must be re-created (absent or unreadable).
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Corrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_corrupt_are_missing() {
        assert!(StoreError::NotFound("oauth tokens").is_missing());
        assert!(StoreError::Corrupt {
            kind: "oauth tokens",
            reason: "bad".to_string()
        }
        .is_missing());
        assert!(!StoreError::Unavailable("disk".to_string()).is_missing());
    }

    #[test]
    fn corrupt_message_names_record_kind() {
        let err = StoreError::Corrupt {
            kind: "aws credentials",
            reason: "not found: session_token".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("aws credentials"));
        assert!(msg.contains("session_token"));
    }
}
