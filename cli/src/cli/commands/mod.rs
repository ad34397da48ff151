//! Command implementations.

pub mod auth;
pub mod completions;
pub mod credentials;
pub mod password;

pub use auth::{handle_login, handle_logout, handle_oidc_login, handle_status};
pub use completions::handle_completions;
pub use credentials::{handle_console_signin, handle_credentials};
pub use password::handle_reset_password;
