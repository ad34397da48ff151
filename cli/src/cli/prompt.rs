//! Terminal prompts.

use inquire::{Password, PasswordDisplayMode, Text};

use crate::error::Result;

/// Asks for an existing password once.
pub fn password(message: &str) -> Result<String> {
    Ok(Password::new(message)
        .with_display_mode(PasswordDisplayMode::Hidden)
        .without_confirmation()
        .prompt()?)
}

/// Asks for a new password twice.
pub fn new_password() -> Result<String> {
    Ok(Password::new("New password:")
        .with_display_mode(PasswordDisplayMode::Hidden)
        .with_custom_confirmation_message("Confirm new password:")
        .with_custom_confirmation_error_message("The passwords don't match.")
        .prompt()?)
}

pub fn text(message: &str) -> Result<String> {
    Ok(Text::new(message).prompt()?)
}
