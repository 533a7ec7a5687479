//! Application configuration consumed by the engine.
//!
//! This module provides:
//! - [`AppConfig`] - Client registration, endpoints, scopes and store choice
//! - [`OAuthSettings`] - The validated subset the credential manager needs
//!
//! Values are supplied externally (config file, environment). The engine fails
//! closed with [`SyncError::ConfigurationMissing`] when the client id or the
//! redirect target is blank.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::store::StoreKind;

/// Default accounts host.
pub const DEFAULT_AUTH_BASE: &str = "https://accounts.spotify.com";

/// Default Web API base.
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// Scopes needed to read a library and to replay it into an account.
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-library-read",
    "user-library-modify",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-follow-read",
    "user-follow-modify",
    "user-read-private",
];

/// Application configuration.
///
/// # Example
///
/// ```
/// use audiovault_core::config::AppConfig;
///
/// let config = AppConfig::default()
///     .with_client_id("my-client-id")
///     .with_redirect_uri("http://127.0.0.1:8888/callback");
///
/// let settings = config.oauth_settings().unwrap();
/// assert_eq!(settings.client_id, "my-client-id");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Human-readable application name.
    pub app_name: String,

    /// OAuth client id registered with the provider.
    pub client_id: Option<String>,

    /// Redirect target registered with the provider.
    pub redirect_uri: Option<String>,

    /// Scopes requested at login.
    pub scopes: Vec<String>,

    /// Accounts host; `/authorize` and `/api/token` live under it.
    pub auth_base: String,

    /// Web API base URL.
    pub api_base: String,

    /// Token store backend.
    pub token_store: StoreKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Audio Vault".to_string(),
            client_id: None,
            redirect_uri: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            token_store: StoreKind::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document; omitted fields keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Set the client id.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the redirect target.
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Point both hosts somewhere else (tests, proxies).
    pub fn with_endpoints(mut self, auth_base: impl Into<String>, api_base: impl Into<String>) -> Self {
        self.auth_base = auth_base.into();
        self.api_base = api_base.into();
        self
    }

    /// Replace the requested scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Authorization endpoint URL.
    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.auth_base.trim_end_matches('/'))
    }

    /// Token endpoint URL.
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.auth_base.trim_end_matches('/'))
    }

    /// The validated client registration.
    ///
    /// Fails with [`SyncError::ConfigurationMissing`] if the client id or the
    /// redirect target is absent or blank.
    pub fn oauth_settings(&self) -> Result<OAuthSettings, SyncError> {
        let client_id = non_blank(self.client_id.as_deref())
            .ok_or(SyncError::ConfigurationMissing { field: "client_id" })?;
        let redirect_uri = non_blank(self.redirect_uri.as_deref())
            .ok_or(SyncError::ConfigurationMissing { field: "redirect_uri" })?;

        Ok(OAuthSettings {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scopes: self.scopes.clone(),
            authorize_url: self.authorize_url(),
            token_url: self.token_url(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Client registration and endpoints, checked for presence.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthSettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_no_client() {
        let config = AppConfig::default();
        assert!(config.client_id.is_none());
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.scopes.iter().any(|s| s == "user-library-modify"));
    }

    #[test]
    fn test_oauth_settings_missing_client_id() {
        let config = AppConfig::default().with_redirect_uri("http://127.0.0.1:8888/callback");
        assert!(matches!(
            config.oauth_settings(),
            Err(SyncError::ConfigurationMissing { field: "client_id" })
        ));
    }

    #[test]
    fn test_oauth_settings_blank_redirect() {
        let config = AppConfig::default()
            .with_client_id("abc")
            .with_redirect_uri("   ");
        assert!(matches!(
            config.oauth_settings(),
            Err(SyncError::ConfigurationMissing { field: "redirect_uri" })
        ));
    }

    #[test]
    fn test_endpoint_urls() {
        let config = AppConfig::default().with_endpoints("http://localhost:9000/", "http://localhost:9001");
        assert_eq!(config.authorize_url(), "http://localhost:9000/authorize");
        assert_eq!(config.token_url(), "http://localhost:9000/api/token");
    }

    #[test]
    fn test_from_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            client_id = "abc"
            redirect_uri = "http://127.0.0.1:8888/callback"
            token_store = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.client_id.as_deref(), Some("abc"));
        assert_eq!(config.token_store, StoreKind::Memory);
        assert_eq!(config.auth_base, DEFAULT_AUTH_BASE);
        assert_eq!(config.scopes.len(), DEFAULT_SCOPES.len());
    }
}
