//! The credential record and its expiry rules.
//!
//! A [`CredentialRecord`] is owned by the credential manager, persisted as JSON
//! under [`CREDENTIAL_KEY`](crate::store::CREDENTIAL_KEY), replaced on every
//! exchange or refresh and deleted on logout.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Secret;

/// Lead time before expiry inside which a token is refreshed instead of used.
pub const SAFETY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// The current bearer credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Short-lived bearer token.
    pub access_token: Secret,

    /// Long-lived refresh token, if the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret>,

    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: String,

    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Absolute expiry instant.
    pub expires_at: DateTime<Utc>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl CredentialRecord {
    /// Create a record for `access_token` expiring at `expires_at`.
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: None,
            scope: String::new(),
            token_type: default_token_type(),
            expires_at,
        }
    }

    /// Create a record from a relative lifetime as returned by a token endpoint.
    ///
    /// A missing lifetime is treated as [`DEFAULT_EXPIRES_IN_SECS`].
    pub fn expiring_in(access_token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        let lifetime = expires_in.unwrap_or_else(|| Duration::seconds(DEFAULT_EXPIRES_IN_SECS));
        Self::new(access_token, Utc::now() + lifetime)
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Secret::new(refresh_token));
        self
    }

    /// Attach the granted scope string.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Override the token type.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Whether the token has not yet expired (no safety margin).
    pub fn is_live(&self) -> bool {
        self.expires_at > Utc::now()
    }

    /// Whether the token has more than `margin` left before it expires.
    pub fn is_usable_with_margin(&self, margin: Duration) -> bool {
        self.expires_at > Utc::now() + margin
    }

    /// Granted scopes as a list.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }
}
