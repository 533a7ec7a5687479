//! Credential lifecycle: PKCE login, code exchange, refresh and logout.
//!
//! This module provides:
//! - [`CredentialManager`] - Owns the credential record and the login flow
//! - [`AccessTokenSource`] - The seam the remote client uses to get bearer tokens
//! - [`pkce`] - Ephemeral proof-of-possession state
//! - [`callback`] - Loopback listener for the authorization redirect

pub mod callback;
pub mod manager;
pub mod pkce;

use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{AuthUrl, ClientId, RedirectUrl, TokenResponse, TokenUrl};

use crate::config::OAuthSettings;
use crate::credential::CredentialRecord;
use crate::error::{Result, SyncError};
use crate::store::Secret;

pub use callback::{RedirectListener, is_loopback_redirect, wait_for_redirect};
pub use manager::{AuthorizationRequest, CallbackOutcome, CredentialManager};

/// Supplies bearer tokens to the remote client.
///
/// Implemented by [`CredentialManager`]; the remote client only ever sees
/// this trait.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// A token with more than the safety margin left, refreshing in-line if needed.
    async fn access_token(&self) -> Result<Secret>;

    /// Drop all credential state after the remote rejected the token.
    async fn invalidate(&self) -> Result<()>;
}

/// Create an OAuth2 client for a public (secretless) PKCE client.
pub(crate) fn create_oauth_client(settings: &OAuthSettings) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(settings.authorize_url.clone()).map_err(|e| {
        SyncError::TokenExchangeFailed {
            message: format!("invalid auth URL: {}", e),
        }
    })?;

    let token_url = TokenUrl::new(settings.token_url.clone()).map_err(|e| {
        SyncError::TokenExchangeFailed {
            message: format!("invalid token URL: {}", e),
        }
    })?;

    let redirect_url = RedirectUrl::new(settings.redirect_uri.clone()).map_err(|e| {
        SyncError::TokenExchangeFailed {
            message: format!("invalid redirect URI: {}", e),
        }
    })?;

    Ok(BasicClient::new(
        ClientId::new(settings.client_id.clone()),
        None,
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url))
}

/// Map a token endpoint response onto a credential record.
///
/// `previous_refresh` is carried over when the provider omits a new refresh token.
pub(crate) fn record_from_response(
    response: &BasicTokenResponse,
    previous_refresh: Option<&Secret>,
) -> Result<CredentialRecord> {
    let expires_in = response
        .expires_in()
        .map(chrono::Duration::from_std)
        .transpose()
        .map_err(|e| SyncError::TokenExchangeFailed {
            message: format!("invalid expiration duration: {}", e),
        })?;

    let scope = response
        .scopes()
        .map(|scopes| {
            scopes
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let mut record = CredentialRecord::expiring_in(response.access_token().secret(), expires_in)
        .with_scope(scope)
        .with_token_type(token_type_name(response));

    match response.refresh_token() {
        Some(fresh) => record = record.with_refresh_token(fresh.secret()),
        None => record.refresh_token = previous_refresh.cloned(),
    }

    Ok(record)
}

fn token_type_name(response: &BasicTokenResponse) -> String {
    let raw = serde_json::to_value(response.token_type())
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();

    if raw.is_empty() || raw.eq_ignore_ascii_case("bearer") {
        "Bearer".to_string()
    } else {
        raw
    }
}
