//! Passphrase-based authenticated encryption of backup payloads.
//!
//! A key is derived with PBKDF2-HMAC-SHA256 from the passphrase and a fresh
//! 128-bit salt, then the payload JSON is sealed with AES-256-GCM under a fresh
//! 96-bit nonce. Salt and nonce are generated inside [`Vault::encrypt`] for
//! every call and cannot be supplied by the caller.
//!
//! Decryption does not distinguish a wrong passphrase from a corrupted or
//! malformed bundle; both are [`SyncError::DecryptionFailed`].

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, SyncError};
use crate::payload::BackupPayload;

/// Bundle format version.
pub const BUNDLE_VERSION: u32 = 1;

pub const ALGORITHM: &str = "AES-GCM";
pub const KDF: &str = "PBKDF2-SHA256";

/// Key derivation rounds used for new bundles.
pub const DEFAULT_ITERATIONS: u32 = 310_000;

pub const MIN_PASSPHRASE_LEN: usize = 8;

const KEY_SIZE: usize = 32;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;

/// An encrypted payload in its portable form. Binary fields are standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBundle {
    pub version: u32,
    pub algorithm: String,
    pub kdf: String,
    pub iterations: u32,
    pub salt: String,
    pub iv: String,
    pub data: String,
}

impl EncryptedBundle {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SyncError::malformed(e.to_string()))
    }
}

/// Encrypts and decrypts [`BackupPayload`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vault {
    iterations: u32,
}

impl Default for Vault {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// A vault that derives keys with `iterations` rounds.
    ///
    /// Bundles record their own count, so any vault can decrypt them.
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Seal `payload`. A payload that [`BackupPayload::validate`] rejects is
    /// refused here, since it could never be opened again.
    pub fn encrypt(&self, payload: &BackupPayload, passphrase: &str) -> Result<EncryptedBundle> {
        check_passphrase(passphrase)?;
        payload.validate()?;

        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let plaintext = Zeroizing::new(serde_json::to_vec(payload).map_err(|e| SyncError::malformed(e.to_string()))?);

        let key = derive_key(passphrase, &salt, self.iterations);
        let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| SyncError::DecryptionFailed)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| SyncError::DecryptionFailed)?;

        tracing::debug!(
            "Encrypted {} byte payload with {} rounds",
            plaintext.len(),
            self.iterations
        );

        Ok(EncryptedBundle {
            version: BUNDLE_VERSION,
            algorithm: ALGORITHM.to_string(),
            kdf: KDF.to_string(),
            iterations: self.iterations,
            salt: BASE64.encode(salt),
            iv: BASE64.encode(nonce),
            data: BASE64.encode(ciphertext),
        })
    }

    pub fn decrypt(&self, bundle: &EncryptedBundle, passphrase: &str) -> Result<BackupPayload> {
        if bundle.algorithm != ALGORITHM || bundle.kdf != KDF || bundle.iterations == 0 {
            return Err(SyncError::DecryptionFailed);
        }

        let salt = BASE64.decode(&bundle.salt).map_err(|_| SyncError::DecryptionFailed)?;
        let nonce = BASE64.decode(&bundle.iv).map_err(|_| SyncError::DecryptionFailed)?;
        let ciphertext = BASE64.decode(&bundle.data).map_err(|_| SyncError::DecryptionFailed)?;
        if nonce.len() != NONCE_SIZE {
            return Err(SyncError::DecryptionFailed);
        }

        let key = derive_key(passphrase, &salt, bundle.iterations);
        let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| SyncError::DecryptionFailed)?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
                .map_err(|_| SyncError::DecryptionFailed)?,
        );

        let value: Value =
            serde_json::from_slice(&plaintext).map_err(|e| SyncError::malformed(e.to_string()))?;
        BackupPayload::from_value(value)
    }
}

fn check_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
        return Err(SyncError::WeakPassphrase {
            min_len: MIN_PASSPHRASE_LEN,
        });
    }
    Ok(())
}

fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, key.as_mut_slice());
    key
}

/// A loaded export file.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Encrypted(EncryptedBundle),
    Plain(BackupPayload),
}

impl Artifact {
    /// Recognise an encrypted bundle (an object with `algorithm` and `data`)
    /// or a plain payload.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| SyncError::malformed(e.to_string()))?;

        let looks_encrypted = value.get("algorithm").is_some() && value.get("data").is_some();
        if looks_encrypted {
            let bundle = serde_json::from_value(value).map_err(|_| SyncError::DecryptionFailed)?;
            return Ok(Artifact::Encrypted(bundle));
        }

        BackupPayload::from_value(value).map(Artifact::Plain)
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Artifact::Encrypted(_))
    }

    /// The payload, decrypting with `passphrase` when needed.
    pub fn into_payload(self, vault: &Vault, passphrase: Option<&str>) -> Result<BackupPayload> {
        match self {
            Artifact::Plain(payload) => Ok(payload),
            Artifact::Encrypted(bundle) => vault.decrypt(&bundle, passphrase.unwrap_or_default()),
        }
    }
}
