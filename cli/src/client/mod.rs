//! Transports for the identity provider, identity pool and OIDC endpoints.

pub mod aws_json;
pub mod identity_pool;
pub mod identity_provider;
pub mod middleware;
pub mod oidc;
pub mod transport;

pub use identity_pool::{CognitoIdentity, IdentityPool, Logins};
pub use identity_provider::{
    AuthFlow, AuthResult, CodeDelivery, CognitoIdentityProvider, IdentityProvider,
};
pub use oidc::{OAuth2TokenEndpoint, TokenEndpoint};
pub use transport::build_http_client;
