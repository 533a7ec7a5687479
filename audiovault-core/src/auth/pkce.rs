//! Ephemeral proof-of-possession state for the authorization code flow.
//!
//! A [`PendingLogin`] is created when a login starts, persisted under
//! [`PKCE_VERIFIER_KEY`] and [`PKCE_STATE_KEY`], and consumed exactly once by
//! the callback. [`PendingLogin::take`] erases both keys before returning, so
//! a replayed callback always finds nothing.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use oauth2::{PkceCodeChallenge, PkceCodeVerifier};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::store::{PKCE_STATE_KEY, PKCE_VERIFIER_KEY, Secret, SecretStore};

/// Random bytes behind each code verifier (86 base64url characters).
const VERIFIER_BYTES: u32 = 64;

/// Generate a fresh S256 challenge and its verifier.
pub fn new_challenge() -> (PkceCodeChallenge, Secret) {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256_len(VERIFIER_BYTES);
    (challenge, Secret::new(verifier.secret().as_str()))
}

/// The S256 transform: base64url(sha256(verifier)) without padding.
pub fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Verifier and anti-CSRF state of a login in progress.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub verifier: Secret,
    pub state: Secret,
}

impl PendingLogin {
    pub fn new(verifier: Secret, state: Secret) -> Self {
        Self { verifier, state }
    }

    /// The verifier in the form the OAuth client expects.
    pub fn code_verifier(&self) -> PkceCodeVerifier {
        PkceCodeVerifier::new(self.verifier.expose().to_string())
    }

    /// Persist both fields, replacing any earlier pending login.
    pub async fn save<S: SecretStore + ?Sized>(&self, store: &S) -> Result<()> {
        store.set(PKCE_VERIFIER_KEY, &self.verifier).await?;
        store.set(PKCE_STATE_KEY, &self.state).await?;
        Ok(())
    }

    /// Read and erase the pending login.
    ///
    /// Both keys are deleted whatever they contained. Returns `None` unless
    /// both fields were present.
    pub async fn take<S: SecretStore + ?Sized>(store: &S) -> Result<Option<Self>> {
        let verifier = store.get(PKCE_VERIFIER_KEY).await;
        let state = store.get(PKCE_STATE_KEY).await;
        Self::clear(store).await?;

        match (verifier?, state?) {
            (Some(verifier), Some(state)) => Ok(Some(Self { verifier, state })),
            _ => Ok(None),
        }
    }

    /// Erase any pending login.
    pub async fn clear<S: SecretStore + ?Sized>(store: &S) -> Result<()> {
        store.delete(PKCE_VERIFIER_KEY).await?;
        store.delete(PKCE_STATE_KEY).await?;
        Ok(())
    }
}
