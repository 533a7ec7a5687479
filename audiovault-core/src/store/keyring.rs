//! Token store backed by the OS keyring (Keychain, Secret Service, Credential Manager).

use async_trait::async_trait;
use keyring::Entry;

use super::{Secret, SecretStore, StoreError};

/// Stores each credential key as one keyring entry.
///
/// Entries share the service name given to [`try_new`](Self::try_new) and use
/// the store key (`audiovault/credential`, ...) as the account name.
#[derive(Debug)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Fails with [`StoreError::KeyringUnavailable`] when no backend is usable.
    pub fn try_new(service: &str) -> Result<Self, StoreError> {
        Entry::new(service, "audiovault/availability").map_err(|e| StoreError::KeyringUnavailable {
            message: e.to_string(),
        })?;
        Ok(Self {
            service: service.to_string(),
        })
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key).map_err(|e| backend(key, "open", e))
    }
}

fn backend(key: &str, action: &str, e: keyring::Error) -> StoreError {
    StoreError::BackendError {
        message: format!("keyring {} of {} failed: {}", action, key, e),
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(Secret::new(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(backend(key, "read", e)),
        }
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(secret.expose())
            .map_err(|e| backend(key, "write", e))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(backend(key, "delete", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PKCE_STATE_KEY;

    #[test]
    fn test_backend_error_names_key_and_action() {
        let err = backend(PKCE_STATE_KEY, "write", keyring::Error::NoEntry);
        let message = err.to_string();
        assert!(message.contains(PKCE_STATE_KEY));
        assert!(message.contains("write"));
    }

    // Headless hosts often accept writes without persisting them, so this
    // only asserts on hosts where a value actually comes back.
    #[tokio::test]
    async fn test_keyring_round_trip_when_available() {
        let Ok(store) = KeyringStore::try_new("audiovault-test") else {
            return;
        };
        let key = format!("audiovault/test/{}", std::process::id());

        if store.set(&key, &Secret::new("value")).await.is_err() {
            return;
        }
        if let Ok(Some(read)) = store.get(&key).await {
            assert_eq!(read.expose(), "value");
            store.delete(&key).await.unwrap();
            assert!(store.get(&key).await.unwrap().is_none());
        }
        let _ = store.delete(&key).await;
    }
}
