//! Token Store abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for durable key/value persistence of credential state
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`FileStore`] - JSON file on disk, the default for the CLI
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to select a backend
//!
//! # Storage Keys
//!
//! The engine uses three keys: [`CREDENTIAL_KEY`] for the credential record and
//! [`PKCE_VERIFIER_KEY`] / [`PKCE_STATE_KEY`] for the ephemeral login state.
//!
//! # Example
//!
//! ```rust,ignore
//! use audiovault_core::store::{Secret, SecretStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.set("audiovault/credential", &Secret::new("{...}")).await?;
//! let raw = store.get("audiovault/credential").await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

mod file;
mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use file::FileStore;
pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use self::keyring::KeyringStore;

/// Key holding the serialized credential record.
pub const CREDENTIAL_KEY: &str = "audiovault/credential";

/// Key holding the PKCE code verifier between login start and callback.
pub const PKCE_VERIFIER_KEY: &str = "audiovault/pkce/verifier";

/// Key holding the anti-CSRF state between login start and callback.
pub const PKCE_STATE_KEY: &str = "audiovault/pkce/state";

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for token store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Reading or writing the store file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Durable key/value persistence for credential state.
///
/// The credential manager is the only writer. Implementations must make
/// `delete` idempotent.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if a key exists without retrieving the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Box<T> {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        (**self).set(key, secret).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

/// Which backend [`create_store`] should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// OS keyring, falling back to the file store when unavailable.
    Keyring,
    /// JSON file in the data directory.
    #[default]
    File,
    /// Process memory only; login does not survive a restart.
    Memory,
}

/// Create a token store for the requested backend.
///
/// # Backend Selection Logic
///
/// - [`StoreKind::Keyring`]: attempts a [`KeyringStore`] and falls back to a
///   [`FileStore`] at `file_path` with a warning if the keyring is unavailable
///   (or the `keyring-store` feature is disabled)
/// - [`StoreKind::File`]: a [`FileStore`] at `file_path`
/// - [`StoreKind::Memory`]: a [`MemoryStore`]
pub fn create_store(kind: StoreKind, file_path: PathBuf) -> Box<dyn SecretStore> {
    match kind {
        StoreKind::Keyring => {
            #[cfg(feature = "keyring-store")]
            match KeyringStore::try_new("audiovault") {
                Ok(store) => {
                    tracing::info!("Using OS keyring for credential storage");
                    return Box::new(store);
                }
                Err(e) => {
                    tracing::warn!(
                        "Keyring unavailable ({}), falling back to file store at {:?}",
                        e,
                        file_path
                    );
                }
            }

            #[cfg(not(feature = "keyring-store"))]
            tracing::warn!(
                "Keyring storage requested but keyring-store feature not enabled. \
                 Using file store at {:?}",
                file_path
            );

            Box::new(FileStore::new(file_path))
        }
        StoreKind::File => {
            tracing::debug!("Using file credential storage at {:?}", file_path);
            Box::new(FileStore::new(file_path))
        }
        StoreKind::Memory => {
            tracing::debug!("Using in-memory credential storage");
            Box::new(MemoryStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_create_store_memory() {
        let store = create_store(StoreKind::Memory, PathBuf::from("unused.json"));

        store.set("test-key", &Secret::new("test")).await.unwrap();
        let retrieved = store.get("test-key").await.unwrap();
        assert_eq!(retrieved.unwrap().expose(), "test");
    }

    #[tokio::test]
    async fn test_create_store_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let store = create_store(StoreKind::File, path.clone());

        store.set(CREDENTIAL_KEY, &Secret::new("{}")).await.unwrap();
        assert!(path.exists());
        assert!(store.exists(CREDENTIAL_KEY).await.unwrap());
    }

    #[test]
    fn test_store_kind_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: StoreKind,
        }

        let parsed: Wrapper = serde_json::from_str(r#"{"kind":"keyring"}"#).unwrap();
        assert_eq!(parsed.kind, StoreKind::Keyring);
        assert_eq!(StoreKind::default(), StoreKind::File);
    }
}
