//! Token and credential types held by the broker.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Challenge name Cognito returns when an administrator-created user must
/// choose a new password before tokens are issued.
pub const NEW_PASSWORD_REQUIRED: &str = "NEW_PASSWORD_REQUIRED";

/// Lifetime assumed when a token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Identity tokens issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTokens {
    /// The access token (used for global sign-out).
    pub access_token: String,
    /// The refresh token. Empty when the provider did not issue one.
    #[serde(default)]
    pub refresh_token: String,
    /// The ID token carrying the provider-asserted identity claims.
    pub id_token: String,
    /// When the access and ID tokens expire, truncated to whole seconds.
    pub expiry: DateTime<Utc>,
}

impl IdentityTokens {
    /// Builds a token set from a provider response carrying a relative
    /// `expires_in` lifetime in seconds.
    #[must_use]
    pub fn from_expires_in(
        access_token: String,
        refresh_token: Option<String>,
        id_token: String,
        expires_in: Option<i64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.unwrap_or_default(),
            id_token,
            expiry: expiry_from_expires_in(expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)),
        }
    }

    /// Checks the fields a persisted record must carry.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.access_token.is_empty() {
            return Err("not found: access_token".to_string());
        }
        if self.id_token.is_empty() {
            return Err("not found: id_token".to_string());
        }
        Ok(())
    }

    /// Check if the tokens have expired.
    #[must_use]
    pub fn has_expired(&self) -> bool {
        is_expired_at(self.expiry, Utc::now())
    }

    /// Keeps `previous` as the refresh token when this set carries none.
    ///
    /// Refresh grants usually do not reissue the refresh token.
    #[must_use]
    pub fn carry_refresh_token(mut self, previous: &str) -> Self {
        if self.refresh_token.is_empty() {
            self.refresh_token = previous.to_string();
        }
        self
    }
}

/// Temporary AWS credentials minted by the identity pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsCredentials {
    /// Access key ID.
    pub access_key: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token.
    pub session_token: String,
    /// When the credentials expire.
    pub expiry: DateTime<Utc>,
}

impl AwsCredentials {
    /// Checks that every field is present.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.access_key.is_empty() {
            return Err("not found: access_key".to_string());
        }
        if self.secret_access_key.is_empty() {
            return Err("not found: secret_access_key".to_string());
        }
        if self.session_token.is_empty() {
            return Err("not found: session_token".to_string());
        }
        Ok(())
    }

    /// Check if the credentials have expired.
    #[must_use]
    pub fn has_expired(&self) -> bool {
        is_expired_at(self.expiry, Utc::now())
    }
}

/// An interactive step the identity provider requires before issuing tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    /// Challenge name, e.g. [`NEW_PASSWORD_REQUIRED`].
    pub name: String,
    /// Opaque continuation session returned with the challenge.
    pub session: String,
}

impl ChallengeResponse {
    /// Whether this is the forced password change challenge.
    #[must_use]
    pub fn is_new_password_required(&self) -> bool {
        self.name == NEW_PASSWORD_REQUIRED
    }
}

/// Converts a relative lifetime into an absolute expiry, truncated to seconds.
#[must_use]
pub fn expiry_from_expires_in(expires_in: i64) -> DateTime<Utc> {
    (Utc::now() + Duration::seconds(expires_in)).trunc_subsecs(0)
}

/// Expiry test shared by both record types.
///
/// Both sides are compared at whole-second granularity and a tie counts as
/// expired.
#[must_use]
pub fn is_expired_at(expiry: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expiry.trunc_subsecs(0) <= now.trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(expiry: DateTime<Utc>) -> IdentityTokens {
        IdentityTokens {
            access_token: "ABCDEFGHIJKLMNOP1234567890".to_string(),
            refresh_token: "ABCDEFGHIJKLMNOP".to_string(),
            id_token: "0123456789ABCDEF".to_string(),
            expiry,
        }
    }

    #[test]
    fn tokens_in_the_past_have_expired() {
        let expiry = (Utc::now() - Duration::seconds(300)).trunc_subsecs(0);
        assert!(tokens(expiry).has_expired());
    }

    #[test]
    fn tokens_in_the_future_are_valid() {
        let expiry = (Utc::now() + Duration::seconds(300)).trunc_subsecs(0);
        assert!(!tokens(expiry).has_expired());
    }

    #[test]
    fn expiry_equal_to_now_counts_as_expired() {
        let now = Utc::now().trunc_subsecs(0);
        assert!(is_expired_at(now, now));
        assert!(!is_expired_at(now + Duration::seconds(1), now));
    }

    #[test]
    fn sub_second_jitter_is_ignored() {
        let now = Utc::now().trunc_subsecs(0) + Duration::milliseconds(700);
        let expiry = now.trunc_subsecs(0) + Duration::milliseconds(200);
        assert!(is_expired_at(expiry, now));
    }

    #[test]
    fn from_expires_in_truncates_to_seconds() {
        let tokens = IdentityTokens::from_expires_in(
            "A".to_string(),
            None,
            "I".to_string(),
            Some(3600),
        );
        assert_eq!(tokens.expiry.timestamp_subsec_nanos(), 0);
        assert!(tokens.refresh_token.is_empty());
        assert!(!tokens.has_expired());
    }

    #[test]
    fn carry_refresh_token_only_fills_missing_value() {
        let expiry = Utc::now();
        let mut refreshed = tokens(expiry);
        refreshed.refresh_token = String::new();
        assert_eq!(refreshed.carry_refresh_token("R1").refresh_token, "R1");

        let reissued = tokens(expiry).carry_refresh_token("R1");
        assert_eq!(reissued.refresh_token, "ABCDEFGHIJKLMNOP");
    }

    #[test]
    fn validation_requires_access_and_id_tokens() {
        let mut t = tokens(Utc::now());
        assert!(t.validate().is_ok());

        t.id_token = String::new();
        assert_eq!(t.validate().unwrap_err(), "not found: id_token");

        t.access_token = String::new();
        assert_eq!(t.validate().unwrap_err(), "not found: access_token");
    }

    #[test]
    fn credentials_validation_requires_every_field() {
        let mut creds = AwsCredentials {
            access_key: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "session".to_string(),
            expiry: Utc::now(),
        };
        assert!(creds.validate().is_ok());

        creds.session_token = String::new();
        assert_eq!(creds.validate().unwrap_err(), "not found: session_token");
    }

    #[test]
    fn challenge_detects_new_password_required() {
        let challenge = ChallengeResponse {
            name: NEW_PASSWORD_REQUIRED.to_string(),
            session: "session".to_string(),
        };
        assert!(challenge.is_new_password_required());
    }
}
