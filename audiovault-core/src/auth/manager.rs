//! The credential lifecycle manager.
//!
//! [`CredentialManager`] owns the credential record and every transition of
//! it: login start, callback completion, refresh and logout. Refresh happens
//! synchronously inside [`get_valid_access_token`](CredentialManager::get_valid_access_token),
//! so there is no window between checking expiry and using the token.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), audiovault_core::SyncError> {
//! use audiovault_core::{AppConfig, CredentialManager, MemoryStore};
//!
//! let config = AppConfig::default()
//!     .with_client_id("my-client-id")
//!     .with_redirect_uri("http://127.0.0.1:8888/callback");
//! let manager = CredentialManager::new(MemoryStore::new(), config);
//!
//! let request = manager.begin_login().await?;
//! println!("Visit: {}", request.url);
//!
//! // ... the provider redirects back ...
//! manager
//!     .complete_login_from_redirect("http://127.0.0.1:8888/callback?code=abc&state=xyz")
//!     .await?;
//! let token = manager.get_valid_access_token().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::Duration;
use oauth2::reqwest::async_http_client;
use oauth2::{AuthorizationCode, CsrfToken, RefreshToken, Scope};
use url::Url;

use super::pkce::{self, PendingLogin};
use super::{AccessTokenSource, create_oauth_client, record_from_response};
use crate::config::{AppConfig, OAuthSettings};
use crate::credential::{CredentialRecord, SAFETY_MARGIN_SECS};
use crate::error::{Result, SyncError};
use crate::store::{CREDENTIAL_KEY, Secret, SecretStore};

/// Where to send the user to authorize.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Fully built authorization URL.
    pub url: String,

    /// The anti-CSRF state embedded in `url`.
    pub state: String,
}

/// Result of feeding an address to
/// [`complete_login_from_redirect`](CredentialManager::complete_login_from_redirect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The address carries no authorization code; nothing was done.
    NotACallback,

    /// Login completed. `clean_url` is the address with `code` and `state` removed.
    Completed { clean_url: String },
}

/// Credential lifecycle manager.
///
/// # Type Parameters
///
/// * `S` - The token store implementation to use
pub struct CredentialManager<S: SecretStore> {
    store: S,
    config: AppConfig,
    safety_margin: Duration,
}

impl<S: SecretStore> CredentialManager<S> {
    /// Create a manager with the default 60 second safety margin.
    pub fn new(store: S, config: AppConfig) -> Self {
        Self {
            store,
            config,
            safety_margin: Duration::seconds(SAFETY_MARGIN_SECS),
        }
    }

    /// The token store backing this manager.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Start a PKCE login.
    ///
    /// Generates a verifier, its S256 challenge and a random state, persists
    /// verifier and state, and returns the authorization URL to open.
    /// Fails with [`SyncError::ConfigurationMissing`] before touching the
    /// store if the client id or redirect target is absent.
    pub async fn begin_login(&self) -> Result<AuthorizationRequest> {
        let settings = self.config.oauth_settings()?;
        let client = create_oauth_client(&settings)?;

        let (challenge, verifier) = pkce::new_challenge();

        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(challenge);
        for scope in &settings.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (url, state) = request.url();

        PendingLogin::new(verifier, Secret::new(state.secret().as_str()))
            .save(&self.store)
            .await?;

        tracing::info!("Started authorization for client {}", settings.client_id);

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state: state.secret().to_string(),
        })
    }

    /// Complete a login from the address the provider redirected to.
    ///
    /// - `error` parameter present: pending state is erased and the call fails
    ///   with [`SyncError::AuthorizationDenied`].
    /// - no `code` parameter: returns [`CallbackOutcome::NotACallback`].
    /// - otherwise the pending state is consumed; a mismatch or missing
    ///   verifier fails with [`SyncError::StateMismatch`], and a match
    ///   exchanges the code and persists the new credential record.
    ///
    /// Pending state is gone after any call that carried a code, whatever the
    /// outcome, so a replayed callback cannot complete twice.
    pub async fn complete_login_from_redirect(&self, redirect: &str) -> Result<CallbackOutcome> {
        let mut url = Url::parse(redirect).map_err(|e| SyncError::Callback {
            message: format!("invalid redirect address: {}", e),
        })?;

        let mut code = None;
        let mut state = None;
        let mut error = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(reason) = error {
            PendingLogin::clear(&self.store).await?;
            tracing::warn!("Authorization denied by provider: {}", reason);
            return Err(SyncError::AuthorizationDenied { reason });
        }

        let Some(code) = code else {
            return Ok(CallbackOutcome::NotACallback);
        };

        let pending = PendingLogin::take(&self.store).await?;
        let pending = match (pending, state) {
            (Some(pending), Some(state)) if pending.state.expose() == state => pending,
            _ => {
                tracing::warn!("Authorization callback state did not match a pending login");
                return Err(SyncError::StateMismatch);
            }
        };

        let settings = self.config.oauth_settings()?;
        let record = self.exchange_code(&settings, code, &pending).await?;
        self.store_credential(&record).await?;

        strip_callback_params(&mut url);
        tracing::info!("Login completed; token valid until {}", record.expires_at);

        Ok(CallbackOutcome::Completed {
            clean_url: url.to_string(),
        })
    }

    /// Return an access token with more than the safety margin left.
    ///
    /// Refreshes in-line when the stored token is inside the margin. A failed
    /// refresh, or an expiring token without a refresh token, logs out and
    /// fails with [`SyncError::SessionExpired`].
    pub async fn get_valid_access_token(&self) -> Result<Secret> {
        let record = self.credential().await?.ok_or(SyncError::NotAuthenticated)?;

        if record.is_usable_with_margin(self.safety_margin) {
            tracing::debug!("Using cached access token");
            return Ok(record.access_token);
        }

        let Some(refresh_token) = record.refresh_token.clone() else {
            tracing::info!("Access token expiring and no refresh token available");
            self.logout().await?;
            return Err(SyncError::SessionExpired);
        };

        let settings = self.config.oauth_settings()?;

        tracing::info!("Access token expiring at {}, refreshing", record.expires_at);
        match self.refresh(&settings, &refresh_token).await {
            Ok(refreshed) => {
                self.store_credential(&refreshed).await?;
                tracing::info!("Refreshed access token; valid until {}", refreshed.expires_at);
                Ok(refreshed.access_token)
            }
            Err(e) => {
                tracing::error!("Failed to refresh access token: {}", e);
                self.logout().await?;
                Err(SyncError::SessionExpired)
            }
        }
    }

    /// Whether a record exists and has not yet expired (no safety margin).
    pub async fn is_authenticated(&self) -> bool {
        match self.credential().await {
            Ok(Some(record)) => record.is_live(),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Could not read credential record: {}", e);
                false
            }
        }
    }

    /// Clear the credential record and any pending login.
    pub async fn logout(&self) -> Result<()> {
        PendingLogin::clear(&self.store).await?;
        self.store.delete(CREDENTIAL_KEY).await?;
        tracing::info!("Cleared stored credentials");
        Ok(())
    }

    /// The stored record, if any.
    ///
    /// A record that fails to parse is deleted and reported as absent.
    pub async fn credential(&self) -> Result<Option<CredentialRecord>> {
        let Some(raw) = self.store.get(CREDENTIAL_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<CredentialRecord>(raw.expose()) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!("Discarding unreadable credential record: {}", e);
                self.store.delete(CREDENTIAL_KEY).await?;
                Ok(None)
            }
        }
    }

    /// Persist a credential record, replacing the current one.
    pub async fn store_credential(&self, record: &CredentialRecord) -> Result<()> {
        let json = serde_json::to_string(record).map_err(crate::store::StoreError::from)?;
        self.store.set(CREDENTIAL_KEY, &Secret::new(json)).await?;
        tracing::debug!("Stored credential record");
        Ok(())
    }

    async fn exchange_code(
        &self,
        settings: &OAuthSettings,
        code: String,
        pending: &PendingLogin,
    ) -> Result<CredentialRecord> {
        let client = create_oauth_client(settings)?;

        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pending.code_verifier())
            .request_async(async_http_client)
            .await
            .map_err(|e| SyncError::TokenExchangeFailed {
                message: e.to_string(),
            })?;

        record_from_response(&response, None)
    }

    async fn refresh(&self, settings: &OAuthSettings, refresh_token: &Secret) -> Result<CredentialRecord> {
        let client = create_oauth_client(settings)?;

        let response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.expose().to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| SyncError::TokenExchangeFailed {
                message: format!("token refresh failed: {}", e),
            })?;

        record_from_response(&response, Some(refresh_token))
    }
}

/// Remove `code` and `state` from the query, keeping every other parameter.
fn strip_callback_params(url: &mut Url) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "code" && k != "state")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

#[async_trait]
impl<S: SecretStore + 'static> AccessTokenSource for CredentialManager<S> {
    async fn access_token(&self) -> Result<Secret> {
        self.get_valid_access_token().await
    }

    async fn invalidate(&self) -> Result<()> {
        self.logout().await
    }
}
