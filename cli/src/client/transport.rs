//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;

use crate::client::middleware::RequestLogMiddleware;
use crate::config::HttpConfig;
use crate::error::Result;

/// Builds the HTTP client used by every transport.
///
/// Requests are logged, and transient failures (connection errors, 5xx,
/// 429) are retried with exponential backoff up to `max_retries` times.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_http_client(config: &HttpConfig) -> Result<ClientWithMiddleware> {
    let inner = Client::builder()
        .user_agent(format!("cogauth/{}", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(inner)
        .with(RequestLogMiddleware)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// HTTP configuration for tests: no retries, short timeout.
#[cfg(test)]
pub(crate) fn test_client() -> ClientWithMiddleware {
    build_http_client(&HttpConfig {
        timeout_secs: 5,
        max_retries: 0,
        ..HttpConfig::default()
    })
    .unwrap()
}
