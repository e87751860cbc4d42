//! `RocksDB` storage backend for persistent deployments.
//!
//! Every call is dispatched to the blocking pool via
//! [`tokio::task::spawn_blocking`] since `RocksDB` is a synchronous library.
//! Keys are opaque UTF-8 strings and values opaque bytes; the record store
//! above decides the key layout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{DBWithThreadMode, MultiThreaded, Options};

use crate::{StorageBackend, StorageError};

type Db = DBWithThreadMode<MultiThreaded>;

/// A storage backend backed by `RocksDB`.
///
/// Cheap to clone; all clones share one `Arc<DB>`.
///
/// # Examples
///
/// ```no_run
/// # use infravault_storage::RocksDbBackend;
/// let backend = RocksDbBackend::open("/var/lib/infravault/data").unwrap();
/// ```
#[derive(Clone)]
pub struct RocksDbBackend {
    db: Arc<Db>,
    path: PathBuf,
}

impl std::fmt::Debug for RocksDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RocksDbBackend {
    /// Open (or create) a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if `RocksDB` cannot open the directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = Db::open(&opts, path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(path = %path.display(), "rocksdb storage opened");

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Filesystem path of this database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` on the blocking pool, mapping a panicked task through `on_join`.
    async fn blocking<T, F>(
        &self,
        op: F,
        on_join: impl FnOnce(String) -> StorageError,
    ) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Db) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| on_join(format!("blocking task panicked: {e}")))?
    }
}

#[async_trait::async_trait]
impl StorageBackend for RocksDbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let owned = key.to_owned();
        let for_join = key.to_owned();
        self.blocking(
            move |db| {
                db.get(owned.as_bytes()).map_err(|e| StorageError::Read {
                    key: owned,
                    reason: e.to_string(),
                })
            },
            |reason| StorageError::Read { key: for_join, reason },
        )
        .await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let owned = key.to_owned();
        let for_join = key.to_owned();
        let value = value.to_vec();
        self.blocking(
            move |db| {
                db.put(owned.as_bytes(), &value)
                    .map_err(|e| StorageError::Write {
                        key: owned,
                        reason: e.to_string(),
                    })
            },
            |reason| StorageError::Write { key: for_join, reason },
        )
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let owned = key.to_owned();
        let for_join = key.to_owned();
        self.blocking(
            move |db| {
                db.delete(owned.as_bytes()).map_err(|e| StorageError::Delete {
                    key: owned,
                    reason: e.to_string(),
                })
            },
            |reason| StorageError::Delete { key: for_join, reason },
        )
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let owned = prefix.to_owned();
        let for_join = prefix.to_owned();
        self.blocking(
            move |db| {
                let iter = db.iterator(rocksdb::IteratorMode::From(
                    owned.as_bytes(),
                    rocksdb::Direction::Forward,
                ));

                let mut keys = Vec::new();
                for item in iter {
                    let (k, _) = item.map_err(|e| StorageError::List {
                        prefix: owned.clone(),
                        reason: e.to_string(),
                    })?;
                    let key = String::from_utf8(k.to_vec()).map_err(|e| {
                        StorageError::InvalidKey {
                            reason: e.to_string(),
                        }
                    })?;
                    // Keys are sorted: the first non-match ends the prefix range.
                    if !key.starts_with(&owned) {
                        break;
                    }
                    keys.push(key);
                }
                Ok(keys)
            },
            |reason| StorageError::List {
                prefix: for_join,
                reason,
            },
        )
        .await
    }
}
