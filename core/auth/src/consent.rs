//! Loopback consent surface: system browser plus a one-shot local redirect listener.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use cloudlink_common::{Error, Result};

use crate::broker::{CallbackParams, ConsentOutcome, ConsentRequest, ConsentSurface};

/// Largest request head accepted on the redirect listener.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

const CALLBACK_PAGE: &str = "<html><body><h3>Sign-in complete.</h3>\
<p>You can close this window and return to the terminal.</p></body></html>";

/// Consent surface for desktop and terminal use.
///
/// Opens the consent page in the system browser (or prints it) and accepts
/// the provider's redirect on the loopback address named by the redirect URL.
pub struct LoopbackConsent {
    launch_browser: bool,
    timeout: Duration,
}

impl LoopbackConsent {
    /// Create a loopback surface that gives up after `timeout`.
    pub fn new(launch_browser: bool, timeout: Duration) -> Self {
        Self {
            launch_browser,
            timeout,
        }
    }
}

#[async_trait]
impl ConsentSurface for LoopbackConsent {
    async fn present(&self, request: &ConsentRequest) -> Result<ConsentOutcome> {
        let host = request
            .redirect_url
            .host_str()
            .ok_or_else(|| Error::InvalidInput("Redirect URL has no host".to_string()))?;
        let port = request
            .redirect_url
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidInput("Redirect URL has no port".to_string()))?;

        let listener = TcpListener::bind((host, port)).await?;
        tracing::debug!(%host, port, "Listening for consent redirect");

        if self.launch_browser {
            if let Err(e) = open::that(request.url.as_str()) {
                tracing::warn!("Could not open browser: {}", e);
                tracing::info!("Open this URL to sign in:\n{}", request.url);
            }
        } else {
            tracing::info!("Open this URL to sign in:\n{}", request.url);
        }

        let params = tokio::time::timeout(
            self.timeout,
            await_callback(listener, &request.redirect_url),
        )
        .await
        .map_err(|_| {
            Error::Provider(format!(
                "No consent result within {} seconds",
                self.timeout.as_secs()
            ))
        })??;

        Ok(ConsentOutcome::Completed(params))
    }
}

/// Accept connections until one hits the redirect path, then answer it.
pub(crate) async fn await_callback(listener: TcpListener, redirect_url: &Url) -> Result<CallbackParams> {
    loop {
        let (mut stream, peer) = listener.accept().await?;

        let target = match read_request_target(&mut stream).await {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!(%peer, "Ignoring unreadable request: {}", e);
                continue;
            }
        };

        let url = match redirect_url.join(&target) {
            Ok(url) if url.path() == redirect_url.path() => url,
            _ => {
                respond(&mut stream, "404 Not Found", "Not found").await;
                continue;
            }
        };

        respond(&mut stream, "200 OK", CALLBACK_PAGE).await;
        return Ok(CallbackParams::from_url(&url));
    }
}

/// Read the request head and return the request-target of a GET.
async fn read_request_target(stream: &mut TcpStream) -> Result<String> {
    let mut head = Vec::with_capacity(1024);
    let mut buf = [0u8; 1024];

    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.len() > MAX_REQUEST_HEAD {
            return Err(Error::InvalidInput("Request head too large".to_string()));
        }
    }

    let head = String::from_utf8_lossy(&head);
    let request_line = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();

    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(target.to_string()),
        _ => Err(Error::InvalidInput(format!(
            "Unexpected request line: {}",
            request_line
        ))),
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to answer redirect request: {}", e);
    }
    if let Err(e) = stream.shutdown().await {
        tracing::debug!("Failed to close redirect connection: {}", e);
    }
}
