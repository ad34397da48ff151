//! Self-service password reset for user pool accounts.

use std::sync::Arc;

use crate::client::{CodeDelivery, IdentityProvider};
use crate::error::{BrokerError, Result};

/// Two-step reset: send a code, then set the new password with it.
pub struct PasswordResetter {
    provider: Arc<dyn IdentityProvider>,
}

impl PasswordResetter {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Sends a verification code to the user's registered contact.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::PasswordResetFailed`].
    pub async fn init_reset(&self, username: &str) -> Result<CodeDelivery> {
        let delivery = self
            .provider
            .forgot_password(username)
            .await
            .map_err(|e| BrokerError::PasswordResetFailed(e.to_string()))?;
        tracing::info!(medium = %delivery.medium, "password reset code sent");
        Ok(delivery)
    }

    /// Sets `password` using the verification `code`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::PasswordResetFailed`].
    pub async fn confirm_reset(&self, username: &str, code: &str, password: &str) -> Result<()> {
        self.provider
            .confirm_forgot_password(username, code, password)
            .await
            .map_err(|e| BrokerError::PasswordResetFailed(e.to_string()))
    }
}
