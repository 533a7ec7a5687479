//! Authenticated, rate-limit aware access to the library API.
//!
//! This module provides:
//! - [`RemoteClient`] - The single `call` entry point with retry and classification
//! - [`RetryPolicy`] - Attempt bound and backoff timing
//! - [`paging`] - Offset and cursor pagination collectors
//! - [`batch`] - Sequential fixed-size mutation batches with progress
//! - [`LibraryRemote`] / [`SpotifyLibrary`] - Typed library operations
//!
//! Every call is sequential. Retries sleep in-line and never overlap with
//! other requests.

pub mod batch;
pub mod library;
pub mod paging;
pub mod retry;
pub mod types;

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::AccessTokenSource;
use crate::error::{Result, SyncError};

pub use batch::{BatchProgress, run_batches};
pub use library::{LibraryRemote, SpotifyLibrary};
pub use retry::RetryPolicy;
pub use types::{PlaylistDraft, PlaylistEntry, RemotePlaylist, UserProfile};

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteResponse {
    Json(Value),

    /// `204`, an empty body, or a body that is not JSON.
    NoContent,
}

impl RemoteResponse {
    pub fn into_json(self) -> Option<Value> {
        match self {
            RemoteResponse::Json(value) => Some(value),
            RemoteResponse::NoContent => None,
        }
    }
}

/// HTTP client for the library API.
///
/// Obtains a bearer token per attempt from an [`AccessTokenSource`] and
/// classifies every response:
///
/// | Status | Behaviour |
/// |--------|-----------|
/// | 2xx    | decoded JSON, or [`RemoteResponse::NoContent`] |
/// | 401    | token source invalidated, [`SyncError::SessionExpired`] |
/// | 429    | sleep `Retry-After` (or the default) and retry |
/// | 5xx    | linear backoff and retry |
/// | other  | [`SyncError::RemoteRequestFailed`], never retried |
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    api_base: String,
    tokens: Arc<dyn AccessTokenSource>,
    retry: RetryPolicy,
}

impl RemoteClient {
    pub fn new(api_base: impl Into<String>, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tokens,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Resolve `path` against the API base.
    ///
    /// Absolute URLs (provider-issued `next` links) are used as they are, but
    /// only under the API base; the bearer token is never sent elsewhere.
    pub fn url_for(&self, path: &str) -> Result<String> {
        if !(path.starts_with("http://") || path.starts_with("https://")) {
            return Ok(format!("{}{}", self.api_base, path));
        }

        let under_base = path
            .strip_prefix(self.api_base.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'));
        if !under_base {
            return Err(SyncError::InvalidResponse {
                path: path.to_string(),
                message: format!("link points outside {}", self.api_base),
            });
        }
        Ok(path.to_string())
    }

    /// Issue one logical call, retrying transient failures up to the policy bound.
    pub async fn call(&self, path: &str, method: Method, body: Option<&Value>) -> Result<RemoteResponse> {
        let url = self.url_for(path)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let token = self.tokens.access_token().await?;

            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token.expose())
                .header(ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::debug!("{} {} (attempt {})", method, path, attempt);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    if !self.retry.allows_retry(attempt) {
                        return Err(SyncError::Network {
                            path: path.to_string(),
                            message: e.to_string(),
                        });
                    }
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}, retrying in {:?}",
                        path,
                        attempt,
                        self.retry.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                tracing::warn!("Remote rejected the access token on {}; signing out", path);
                if let Err(e) = self.tokens.invalidate().await {
                    tracing::error!("Failed to clear rejected credentials: {}", e);
                }
                return Err(SyncError::SessionExpired);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                if !self.retry.allows_retry(attempt) {
                    tracing::warn!("Still rate limited on {} after {} attempts", path, attempt);
                    return Err(SyncError::RateLimited {
                        path: path.to_string(),
                        attempts: attempt,
                    });
                }
                let delay = self.retry.rate_limit_delay(response.headers());
                tracing::warn!(
                    "Rate limited on {} (attempt {}/{}), retrying in {:?}",
                    path,
                    attempt,
                    self.retry.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if status.is_server_error() {
                if !self.retry.allows_retry(attempt) {
                    tracing::warn!("Server error {} on {} after {} attempts", status, path, attempt);
                    return Err(SyncError::ServerError {
                        status: status.as_u16(),
                        path: path.to_string(),
                    });
                }
                let delay = self.retry.backoff(attempt);
                tracing::warn!(
                    "Server error {} on {} (attempt {}/{}), retrying in {:?}",
                    status,
                    path,
                    attempt,
                    self.retry.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::debug!("{} {} failed with {}", method, path, status);
                return Err(SyncError::RemoteRequestFailed {
                    status: status.as_u16(),
                    path: path.to_string(),
                    body,
                });
            }

            return decode_success(path, response).await;
        }
    }

    /// `GET` a path and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        match self.call(path, Method::GET, None).await? {
            RemoteResponse::Json(value) => serde_json::from_value(value).map_err(|e| SyncError::InvalidResponse {
                path: path.to_string(),
                message: e.to_string(),
            }),
            RemoteResponse::NoContent => Err(SyncError::InvalidResponse {
                path: path.to_string(),
                message: "expected a JSON body".to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("api_base", &self.api_base)
            .field("retry", &self.retry)
            .finish()
    }
}

async fn decode_success(path: &str, response: reqwest::Response) -> Result<RemoteResponse> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(RemoteResponse::NoContent);
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("json"));
    if !is_json {
        return Ok(RemoteResponse::NoContent);
    }

    let bytes = response.bytes().await.map_err(|e| SyncError::Network {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RemoteResponse::NoContent);
    }

    serde_json::from_slice(&bytes)
        .map(RemoteResponse::Json)
        .map_err(|e| SyncError::InvalidResponse {
            path: path.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Secret;
    use async_trait::async_trait;

    struct StaticToken;

    #[async_trait]
    impl AccessTokenSource for StaticToken {
        async fn access_token(&self) -> Result<Secret> {
            Ok(Secret::new("token"))
        }

        async fn invalidate(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_url_for() {
        let client = RemoteClient::new("https://api.example.com/v1/", Arc::new(StaticToken));
        assert_eq!(client.url_for("/me").unwrap(), "https://api.example.com/v1/me");
        assert_eq!(
            client.url_for("https://api.example.com/v1/me/tracks?offset=50").unwrap(),
            "https://api.example.com/v1/me/tracks?offset=50"
        );
    }

    #[test]
    fn test_url_for_rejects_foreign_links() {
        let client = RemoteClient::new("https://api.example.com/v1", Arc::new(StaticToken));
        for link in [
            "https://evil.example.net/v1/me",
            "https://api.example.com/v2/me",
            "https://api.example.com/v1evil/me",
            "https://api.example.com.evil.net/v1/me",
        ] {
            assert!(
                matches!(client.url_for(link), Err(SyncError::InvalidResponse { .. })),
                "link {:?}",
                link
            );
        }
    }

    #[test]
    fn test_remote_response_into_json() {
        assert_eq!(
            RemoteResponse::Json(serde_json::json!({"a": 1})).into_json(),
            Some(serde_json::json!({"a": 1}))
        );
        assert_eq!(RemoteResponse::NoContent.into_json(), None);
    }
}
