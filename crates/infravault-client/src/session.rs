//! Per-session key store.
//!
//! One [`SessionKey`] exists per login session. It is generated lazily on
//! the first reveal, kept only in volatile storage, and destroyed on logout.
//! Envelopes fetched under a destroyed key can never be opened again.

use std::sync::Arc;

use async_trait::async_trait;
use infravault_core::crypto::SessionKey;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{ClientError, SessionStorageError};

/// A volatile slot for the base64 session key.
///
/// Implementations must not persist the key beyond the session (no disk,
/// no shared storage).
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self) -> Result<Option<Zeroizing<String>>, SessionStorageError>;
    async fn store(&self, encoded: &str) -> Result<(), SessionStorageError>;
    async fn clear(&self) -> Result<(), SessionStorageError>;
}

/// In-process session storage; the key dies with the process.
#[derive(Default)]
pub struct MemorySessionStorage {
    slot: RwLock<Option<Zeroizing<String>>>,
}

impl MemorySessionStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self) -> Result<Option<Zeroizing<String>>, SessionStorageError> {
        Ok(self.slot.read().await.clone())
    }

    async fn store(&self, encoded: &str) -> Result<(), SessionStorageError> {
        *self.slot.write().await = Some(Zeroizing::new(encoded.to_owned()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStorageError> {
        self.slot.write().await.take();
        Ok(())
    }
}

/// Creates, returns and destroys the session key.
pub struct SessionKeyStore {
    storage: Arc<dyn SessionStorage>,
    // Serializes get_or_create so concurrent reveals share one key.
    writer: Mutex<()>,
}

impl SessionKeyStore {
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            writer: Mutex::new(()),
        }
    }

    /// A store over [`MemorySessionStorage`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStorage::new()))
    }

    /// Return the session key, generating and storing one if none exists.
    ///
    /// If the storage slot fails, a fresh key is generated for this call
    /// only. The next reveal then uses yet another key, which costs a
    /// round-trip but never weakens the encryption.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::KeyGeneration`] if the OS RNG is unavailable.
    pub async fn get_or_create(&self) -> Result<SessionKey, ClientError> {
        let _guard = self.writer.lock().await;

        match self.storage.load().await {
            Ok(Some(encoded)) => match SessionKey::from_base64(&encoded) {
                Ok(key) => return Ok(key),
                Err(e) => warn!(error = %e, "stored session key unreadable, replacing it"),
            },
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "session storage unreadable, using a one-off key");
                return SessionKey::generate().map_err(ClientError::KeyGeneration);
            }
        }

        let key = SessionKey::generate().map_err(ClientError::KeyGeneration)?;
        if let Err(e) = self.storage.store(&key.to_base64()).await {
            warn!(error = %e, "session storage unwritable, using a one-off key");
        } else {
            debug!("session key created");
        }
        Ok(key)
    }

    /// Forget the session key. Called on logout.
    pub async fn destroy(&self) {
        let _guard = self.writer.lock().await;
        if let Err(e) = self.storage.clear().await {
            warn!(error = %e, "failed to clear session key");
        } else {
            debug!("session key destroyed");
        }
    }
}

impl std::fmt::Debug for SessionKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use infravault_core::crypto;

    use super::*;

    /// Storage whose every operation fails.
    struct BrokenStorage;

    #[async_trait]
    impl SessionStorage for BrokenStorage {
        async fn load(&self) -> Result<Option<Zeroizing<String>>, SessionStorageError> {
            Err(SessionStorageError {
                reason: "private browsing".to_owned(),
            })
        }

        async fn store(&self, _encoded: &str) -> Result<(), SessionStorageError> {
            Err(SessionStorageError {
                reason: "quota exceeded".to_owned(),
            })
        }

        async fn clear(&self) -> Result<(), SessionStorageError> {
            Err(SessionStorageError {
                reason: "gone".to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn key_is_created_once_per_session() {
        let store = SessionKeyStore::in_memory();
        let a = store.get_or_create().await.unwrap();
        let b = store.get_or_create().await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn destroy_forces_a_new_key() {
        let store = SessionKeyStore::in_memory();
        let old = store.get_or_create().await.unwrap();
        let envelope = crypto::encrypt(&old, "OldPass1").unwrap();

        store.destroy().await;
        let new = store.get_or_create().await.unwrap();
        assert_ne!(old, new);
        assert!(crypto::decrypt(&new, &envelope).is_err());
    }

    #[tokio::test]
    async fn broken_storage_falls_back_to_fresh_keys() {
        let store = SessionKeyStore::new(Arc::new(BrokenStorage));
        let a = store.get_or_create().await.unwrap();
        let b = store.get_or_create().await.unwrap();
        assert_ne!(a, b);
        store.destroy().await;
    }

    #[tokio::test]
    async fn corrupt_stored_key_is_replaced() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.store("not a key").await.unwrap();
        let store = SessionKeyStore::new(storage.clone());

        let key = store.get_or_create().await.unwrap();
        let stored = storage.load().await.unwrap().unwrap();
        assert_eq!(SessionKey::from_base64(&stored).unwrap(), key);
    }
}
