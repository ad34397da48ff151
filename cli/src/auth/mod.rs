//! Credential resolution for cogauth.
//!
//! This module turns cached identity tokens into temporary AWS credentials:
//! - [`resolver::TokensResolver`] - cached tokens, refreshed when expired
//! - [`credentials_resolver::CredentialsResolver`] - cached AWS credentials,
//!   re-federated when stale
//! - [`login::LoginHandler`] - password or OIDC login, including the challenge step
//! - [`Broker`] - builds the above from configuration

pub mod broker;
pub mod cache;
pub mod callback;
pub mod console;
pub mod credentials_resolver;
pub mod federation;
pub mod login;
pub mod password_reset;
pub mod refresher;
pub mod resolver;
pub mod tokens;

pub use broker::Broker;
pub use callback::CallbackListener;
pub use login::LoginOutcome;
pub use tokens::AwsCredentials;
