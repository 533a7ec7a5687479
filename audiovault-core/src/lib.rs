//! # Audio Vault Core
//!
//! Sync engine for Audio Vault: snapshot a music library, seal it with a
//! passphrase, and replay it into an account without creating duplicates.
//!
//! This crate provides:
//! - [`CredentialManager`] - PKCE login, in-line token refresh and logout over a [`SecretStore`]
//! - [`RemoteClient`] - Authenticated API calls with rate-limit and 5xx retry
//! - [`SpotifyLibrary`] - Paginated reads and batched writes of library state
//! - [`Vault`] - PBKDF2 + AES-256-GCM encryption of [`BackupPayload`]s
//! - [`Restorer`] - Signature-matched, duplicate-free restore
//! - [`LibraryExporter`] - Snapshot builder
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use audiovault_core::{
//!     AppConfig, CredentialManager, LibraryExporter, MemoryStore, RemoteClient,
//!     SilentProgress, SpotifyLibrary, Vault,
//! };
//!
//! let config = AppConfig::default().with_client_id("id").with_redirect_uri("http://127.0.0.1:8888/callback");
//! let manager = Arc::new(CredentialManager::new(MemoryStore::new(), config.clone()));
//! let library = SpotifyLibrary::new(RemoteClient::new(&config.api_base, manager));
//!
//! let payload = LibraryExporter::new(&library).snapshot(&SilentProgress).await?;
//! let bundle = Vault::new().encrypt(&payload, "a long passphrase")?;
//! ```

pub mod auth;
pub mod config;
pub mod credential;
pub mod error;
pub mod export;
pub mod payload;
pub mod progress;
pub mod remote;
pub mod restore;
pub mod store;
pub mod vault;

// Re-export commonly used types at crate root
pub use auth::{AccessTokenSource, AuthorizationRequest, CallbackOutcome, CredentialManager, RedirectListener};

pub use config::{AppConfig, OAuthSettings};

pub use credential::CredentialRecord;

pub use error::{Result, SyncError};

pub use export::{LibraryExporter, export_file_name};

pub use payload::{AccountIdentity, BackupPayload, PayloadSummary, PlaylistRecord};

pub use progress::{LogProgress, ProgressObserver, RestoreCounts, SilentProgress};

pub use remote::{
    BatchProgress, LibraryRemote, PlaylistDraft, PlaylistEntry, RemoteClient, RemotePlaylist,
    RemoteResponse, RetryPolicy, SpotifyLibrary, UserProfile,
};

pub use restore::{PlaylistSignature, RestoreOptions, RestoreSummary, Restorer};

pub use store::{FileStore, MemoryStore, Secret, SecretStore, StoreError, StoreKind, create_store};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use vault::{Artifact, EncryptedBundle, Vault};
