//! Loopback listener for the authorization redirect.
//!
//! The provider sends the browser back to the registered redirect target.
//! When that target is a loopback address, [`RedirectListener`] receives the
//! request and hands the full redirect address to
//! [`CredentialManager::complete_login_from_redirect`](super::CredentialManager::complete_login_from_redirect).
//! It does no validation of its own; state checking belongs to the manager.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use crate::error::{Result, SyncError};

const SUCCESS_PAGE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Audio Vault</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const NOT_FOUND_PAGE: &[u8] = b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n";

/// Whether `redirect_uri` points at this machine over plain HTTP.
pub fn is_loopback_redirect(redirect_uri: &str) -> bool {
    let Ok(url) = Url::parse(redirect_uri) else {
        return false;
    };
    url.scheme() == "http"
        && matches!(url.host_str(), Some("127.0.0.1") | Some("localhost") | Some("[::1]"))
}

/// Bind to `redirect_uri` and return the first authorization redirect it receives.
pub async fn wait_for_redirect(redirect_uri: &str) -> Result<String> {
    RedirectListener::for_redirect_uri(redirect_uri)
        .await?
        .accept_redirect()
        .await
}

/// A bound listener waiting for one authorization redirect.
pub struct RedirectListener {
    listener: TcpListener,
    base: Url,
}

impl RedirectListener {
    /// Bind to the host and port of a loopback redirect target.
    pub async fn for_redirect_uri(redirect_uri: &str) -> Result<Self> {
        let base = Url::parse(redirect_uri).map_err(|e| SyncError::Callback {
            message: format!("invalid redirect URI {}: {}", redirect_uri, e),
        })?;

        if !is_loopback_redirect(redirect_uri) {
            return Err(SyncError::Callback {
                message: format!("redirect URI {} is not a loopback address", redirect_uri),
            });
        }

        let host = base.host_str().unwrap_or("127.0.0.1").to_string();
        let port = base.port_or_known_default().unwrap_or(80);
        let addr = format!("{}:{}", host.trim_matches(|c| c == '[' || c == ']'), port);

        let listener = TcpListener::bind(&addr).await.map_err(|e| SyncError::Callback {
            message: format!("failed to bind to {}: {}", addr, e),
        })?;

        tracing::info!("Listening for authorization redirect on {}", addr);
        Ok(Self { listener, base })
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|e| SyncError::Callback {
            message: format!("failed to read local address: {}", e),
        })
    }

    /// Wait for a request to the redirect path that carries `code` or `error`,
    /// and return the full redirect address.
    ///
    /// Other requests (favicons, stray connections) get a 404 and are ignored.
    pub async fn accept_redirect(&self) -> Result<String> {
        loop {
            let (mut socket, peer) = self.listener.accept().await.map_err(|e| SyncError::Callback {
                message: format!("failed to accept connection: {}", e),
            })?;

            let mut buffer = [0; 8192];
            let n = socket.read(&mut buffer).await.map_err(|e| SyncError::Callback {
                message: format!("failed to read request: {}", e),
            })?;
            let request = String::from_utf8_lossy(&buffer[..n]);

            let target = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or_default();

            match self.resolve(target) {
                Some(redirect) => {
                    let _ = socket.write_all(SUCCESS_PAGE).await;
                    tracing::debug!("Received authorization redirect from {}", peer);
                    return Ok(redirect.to_string());
                }
                None => {
                    tracing::debug!("Ignoring request for {:?} from {}", target, peer);
                    let _ = socket.write_all(NOT_FOUND_PAGE).await;
                }
            }
        }
    }

    fn resolve(&self, target: &str) -> Option<Url> {
        let url = self.base.join(target).ok()?;
        if url.path() != self.base.path() {
            return None;
        }
        url.query_pairs()
            .any(|(k, _)| k == "code" || k == "error")
            .then_some(url)
    }
}
