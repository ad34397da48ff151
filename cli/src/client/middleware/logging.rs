//! Request logging middleware.

use std::time::Instant;

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

/// AWS JSON protocol operation header.
const AMZ_TARGET: &str = "x-amz-target";

/// Middleware that logs each request at debug level.
///
/// Only the host, path and AWS operation are logged. Query strings and
/// bodies carry tokens and are never written out.
pub struct RequestLogMiddleware;

#[async_trait]
impl Middleware for RequestLogMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let method = req.method().clone();
        let target = describe(&req);
        let operation = req
            .headers()
            .get(AMZ_TARGET)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        let started = Instant::now();

        let result = next.run(req, extensions).await;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(response) => tracing::debug!(
                %method,
                %target,
                %operation,
                status = response.status().as_u16(),
                elapsed_ms,
                "http request"
            ),
            Err(e) => tracing::debug!(
                %method,
                %target,
                %operation,
                error = %e,
                elapsed_ms,
                "http request failed"
            ),
        }

        result
    }
}

fn describe(req: &Request) -> String {
    let url = req.url();
    format!("{}{}", url.host_str().unwrap_or_default(), url.path())
}
