//! Document storage for `InfraVault`.
//!
//! [`StorageBackend`] is a flat key-value store. The record store in
//! `infravault-core` turns each server, provider and settings document into
//! JSON and files it under its owner, e.g. `users/<owner>/servers/<id>`;
//! bearer token hashes live under `sys/tokens/`.
//!
//! Backends:
//!
//! - [`MemoryBackend`]: the default; nothing survives a restart
//! - [`RocksDbBackend`]: on disk, behind the `rocksdb-backend` feature
//!
//! Secrets are stored in the clear at this layer. Redaction happens when a
//! record is rendered for the API.

mod error;
mod memory;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use error::StorageError;
pub use memory::MemoryBackend;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDbBackend;

/// Where record documents live.
///
/// Each owner's records sit under `users/<owner>/`, so listing one owner's
/// servers is a prefix scan of `users/<owner>/servers/`. Values are the
/// serialized JSON documents; the backend never parses them.
///
/// Shared between request handlers, hence `Send + Sync`.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Load the document stored under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Save a document, replacing whatever was stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove a document. Removing one that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Keys under `prefix`, sorted. An empty prefix lists everything.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] if the underlying backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Whether a document is stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}
