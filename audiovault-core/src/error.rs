//! Top-level error type for the sync engine.

use thiserror::Error;

use crate::store::StoreError;

/// Every failure the engine can surface.
///
/// Transient conditions (rate limits, 5xx, transport errors) are retried
/// inside the remote client before they reach this type. Authorization and
/// payload-integrity errors are never retried.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Client id or redirect target is not configured.
    #[error("configuration missing: {field}")]
    ConfigurationMissing { field: &'static str },

    /// The provider redirected back with an `error` parameter.
    #[error("authorization denied by provider: {reason}")]
    AuthorizationDenied { reason: String },

    /// The callback's state does not match the pending login, or no login is pending.
    #[error("authorization state mismatch; start the login again")]
    StateMismatch,

    /// The provider rejected the authorization code exchange.
    #[error("token exchange failed: {message}")]
    TokenExchangeFailed { message: String },

    /// No credential record is stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The session ended (401, failed refresh, or expired without refresh token).
    #[error("session expired; sign in again")]
    SessionExpired,

    /// Still rate limited after the retry budget was spent.
    #[error("rate limited on {path} after {attempts} attempts")]
    RateLimited { path: String, attempts: u32 },

    /// Still failing with 5xx after the retry budget was spent.
    #[error("server error {status} on {path}")]
    ServerError { status: u16, path: String },

    /// A non-transient, non-2xx response.
    #[error("remote request failed with status {status} on {path}: {body}")]
    RemoteRequestFailed {
        status: u16,
        path: String,
        body: String,
    },

    /// The HTTP exchange itself failed after the retry budget was spent.
    #[error("network error on {path}: {message}")]
    Network { path: String, message: String },

    /// A successful response whose body is not the expected JSON.
    #[error("invalid response from {path}: {message}")]
    InvalidResponse { path: String, message: String },

    /// The local redirect listener failed.
    #[error("callback listener failed: {message}")]
    Callback { message: String },

    /// Passphrase shorter than the minimum length.
    #[error("passphrase must be at least {min_len} characters")]
    WeakPassphrase { min_len: usize },

    /// Wrong passphrase, tampered ciphertext or malformed bundle.
    #[error("decryption failed (wrong passphrase or corrupted backup)")]
    DecryptionFailed,

    /// The payload does not have the backup schema's shape.
    #[error("malformed backup payload: {reason}")]
    MalformedPayload { reason: String },

    /// Token store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Whether this is a remote `403 Forbidden`.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, SyncError::RemoteRequestFailed { status: 403, .. })
    }

    /// Whether the caller must sign in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            SyncError::NotAuthenticated | SyncError::SessionExpired | SyncError::StateMismatch
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        SyncError::MalformedPayload {
            reason: reason.into(),
        }
    }
}

/// Result alias used across the engine.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
