//! Loopback listener for the OIDC authorization code redirect.
//!
//! The browser is redirected to the configured `redirect_url` with
//! `code` and `state` query parameters. The listener answers requests for
//! other paths (e.g. `/favicon.ico`) with a 404 and keeps waiting.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use crate::error::{BrokerError, Result};

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>cogauth | Signed in</title></head>
<body style="font-family: system-ui, sans-serif; text-align: center; margin-top: 20vh">
    <h1>Signed in</h1>
    <p>You can close this window and return to your terminal.</p>
</body>
</html>"#;

const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>cogauth | Sign-in failed</title></head>
<body style="font-family: system-ui, sans-serif; text-align: center; margin-top: 20vh">
    <h1>Sign-in failed</h1>
    <p>Check your terminal for details.</p>
</body>
</html>"#;

/// What one inbound request turned out to be.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    /// The redirect, carrying an authorization code.
    Code(String),
    /// Some other path, or a request that could not be parsed.
    Ignored,
}

/// A bound listener waiting for one authorization redirect.
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Binds the loopback address named by `redirect_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Callback`] if the URL is not a loopback HTTP
    /// URL or the port cannot be bound.
    pub async fn for_redirect(redirect_url: &str) -> Result<Self> {
        let url = Url::parse(redirect_url)?;
        let addr = bind_addr(&url)?;
        Self::bind(addr, url.path()).await
    }

    /// Binds `addr` and waits for redirects to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Callback`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, path: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BrokerError::Callback(format!("cannot listen on {addr}: {e}")))?;
        tracing::debug!(%addr, path, "callback listener ready");
        Ok(Self {
            listener,
            path: path.to_string(),
        })
    }

    /// The bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for the redirect and returns the authorization code.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Timeout`] if no redirect arrives in time, or
    /// [`BrokerError::Callback`] if the redirect carries an error or the
    /// wrong state.
    pub async fn wait(self, expected_state: &str, timeout: Duration) -> Result<String> {
        tokio::time::timeout(timeout, self.accept_until_callback(expected_state))
            .await
            .map_err(|_| BrokerError::Timeout)?
    }

    async fn accept_until_callback(&self, expected_state: &str) -> Result<String> {
        loop {
            let (mut socket, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| BrokerError::Callback(format!("failed to accept connection: {e}")))?;

            let request = match read_request(&mut socket).await {
                Ok(request) => request,
                Err(e) => {
                    tracing::debug!(%peer, error = %e, "dropping unreadable connection");
                    continue;
                },
            };
            match parse_request(&request, &self.path, expected_state) {
                Ok(Callback::Ignored) => {
                    tracing::debug!(%peer, "ignoring unrelated request");
                    respond(&mut socket, "404 Not Found", "").await;
                },
                Ok(Callback::Code(code)) => {
                    respond(&mut socket, "200 OK", SUCCESS_HTML).await;
                    return Ok(code);
                },
                Err(e) => {
                    respond(&mut socket, "400 Bad Request", ERROR_HTML).await;
                    return Err(e);
                },
            }
        }
    }
}

/// Maps a redirect URL to the loopback address to bind.
///
/// # Errors
///
/// Returns [`BrokerError::Callback`] for non-HTTP or non-loopback URLs.
pub fn bind_addr(url: &Url) -> Result<SocketAddr> {
    if url.scheme() != "http" {
        return Err(BrokerError::Callback(format!(
            "redirect URL must use http, got '{}'",
            url.scheme()
        )));
    }
    let port = url.port_or_known_default().unwrap_or(80);
    match url.host_str() {
        Some("localhost" | "127.0.0.1") => Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port))),
        Some(host) => Err(BrokerError::Callback(format!(
            "redirect host '{host}' is not a loopback address"
        ))),
        None => Err(BrokerError::Callback("redirect URL has no host".to_string())),
    }
}

/// Upper bound on the request head read from the browser.
const MAX_REQUEST_BYTES: usize = 8192;

/// Reads the request head: until the blank line, EOF, or the size cap.
async fn read_request(socket: &mut TcpStream) -> Result<String> {
    let mut request = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while request.len() < MAX_REQUEST_BYTES && !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket
            .read(&mut chunk)
            .await
            .map_err(|e| BrokerError::Callback(format!("failed to read request: {e}")))?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..n]);
    }
    request.truncate(MAX_REQUEST_BYTES);
    Ok(String::from_utf8_lossy(&request).into_owned())
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    // The browser may already have gone away.
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn parse_request(request: &str, path: &str, expected_state: &str) -> Result<Callback> {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .filter(|target| target.starts_with('/'))
    else {
        return Ok(Callback::Ignored);
    };
    let Ok(url) = Url::parse(&format!("http://localhost{target}")) else {
        return Ok(Callback::Ignored);
    };
    if url.path() != path {
        return Ok(Callback::Ignored);
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {},
        }
    }

    if let Some(error) = error {
        let description = error_description.unwrap_or_default();
        return Err(BrokerError::Callback(format!("provider returned {error}: {description}")));
    }
    match state.as_deref() {
        Some(s) if s == expected_state => {},
        Some(_) => return Err(BrokerError::Callback("state mismatch".to_string())),
        None => return Err(BrokerError::Callback("missing state parameter".to_string())),
    }
    code.filter(|c| !c.is_empty())
        .map(Callback::Code)
        .ok_or_else(|| BrokerError::Callback("missing authorization code".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_with_matching_state() {
        let request = "GET /?code=abc123&state=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(
            parse_request(request, "/", "xyz").unwrap(),
            Callback::Code("abc123".to_string())
        );
    }

    #[test]
    fn other_paths_are_ignored() {
        let request = "GET /favicon.ico HTTP/1.1\r\n\r\n";
        assert_eq!(parse_request(request, "/", "xyz").unwrap(), Callback::Ignored);
    }

    #[test]
    fn malformed_requests_are_ignored() {
        assert_eq!(parse_request("", "/", "xyz").unwrap(), Callback::Ignored);
        assert_eq!(parse_request("GET", "/", "xyz").unwrap(), Callback::Ignored);
        assert_eq!(
            parse_request("\u{16}\u{3}\u{1} binary junk", "/", "xyz").unwrap(),
            Callback::Ignored
        );
    }

    #[test]
    fn provider_error_is_reported() {
        let request = "GET /callback?error=access_denied&error_description=User+denied HTTP/1.1\r\n\r\n";
        let err = parse_request(request, "/callback", "xyz").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
        assert!(err.to_string().contains("User denied"));
    }

    #[test]
    fn state_mismatch_is_rejected() {
        let request = "GET /?code=abc&state=wrong HTTP/1.1\r\n\r\n";
        let err = parse_request(request, "/", "expected").unwrap_err();
        assert!(err.to_string().contains("state mismatch"));
    }

    #[test]
    fn missing_state_is_rejected() {
        let request = "GET /?code=abc HTTP/1.1\r\n\r\n";
        assert!(parse_request(request, "/", "expected").is_err());
    }

    #[test]
    fn bind_addr_maps_localhost_to_loopback() {
        let url = Url::parse("http://localhost:8080").unwrap();
        assert_eq!(bind_addr(&url).unwrap(), "127.0.0.1:8080".parse().unwrap());

        let remote = Url::parse("http://example.com:8080/cb").unwrap();
        assert!(bind_addr(&remote).is_err());

        let tls = Url::parse("https://localhost:8443").unwrap();
        assert!(bind_addr(&tls).is_err());
    }

    #[tokio::test]
    async fn receives_code_after_unrelated_request() {
        let listener = CallbackListener::bind((Ipv4Addr::LOCALHOST, 0).into(), "/callback")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let waiter = tokio::spawn(listener.wait("xyz", Duration::from_secs(5)));

        let http = reqwest::Client::new();
        let favicon = http
            .get(format!("http://{addr}/favicon.ico"))
            .send()
            .await
            .unwrap();
        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);

        let redirect = http
            .get(format!("http://{addr}/callback?code=the-code&state=xyz"))
            .send()
            .await
            .unwrap();
        assert_eq!(redirect.status(), reqwest::StatusCode::OK);

        assert_eq!(waiter.await.unwrap().unwrap(), "the-code");
    }

    #[tokio::test]
    async fn request_split_across_segments_is_reassembled() {
        let listener = CallbackListener::bind((Ipv4Addr::LOCALHOST, 0).into(), "/callback")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let waiter = tokio::spawn(listener.wait("xyz", Duration::from_secs(5)));

        // a client that connects and closes without a request is skipped
        drop(TcpStream::connect(addr).await.unwrap());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /callback?code=the-co").await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream
            .write_all(b"de&state=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(waiter.await.unwrap().unwrap(), "the-code");
    }

    #[tokio::test]
    async fn times_out_without_redirect() {
        let listener = CallbackListener::bind((Ipv4Addr::LOCALHOST, 0).into(), "/")
            .await
            .unwrap();
        let err = listener.wait("xyz", Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, BrokerError::Timeout));
    }
}
