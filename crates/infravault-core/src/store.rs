//! Per-user record store over a [`StorageBackend`].
//!
//! Records are JSON documents under owner-scoped keys:
//!
//! ```text
//! users/<owner>/servers/<id>
//! users/<owner>/providers/<id>
//! users/<owner>/settings
//! ```
//!
//! Every lookup is built from the caller's own user id, so a record owned by
//! someone else is simply not found. The stored `owner` is checked again on
//! read; a mismatch is reported exactly like a missing key.

use std::sync::Arc;

use infravault_storage::StorageBackend;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Record, RecordKind, SETTINGS_VERSION, Settings};

/// Typed access to the records of every user.
pub struct RecordStore {
    storage: Arc<dyn StorageBackend>,
}

impl RecordStore {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Fetch one record owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the id does not exist for this owner.
    /// - [`StoreError::Serialization`] / [`StoreError::Storage`] on backend
    ///   or decoding failures.
    pub async fn get<R: Record>(&self, owner: &str, id: Uuid) -> Result<R, StoreError> {
        let key = record_key::<R>(owner, id);
        let record: R = self.read(&key).await?.ok_or(StoreError::NotFound {
            kind: R::KIND.as_str(),
        })?;
        if record.owner() != owner || record.id() != id {
            warn!(kind = %R::KIND, %id, "stored record does not match its key");
            return Err(StoreError::NotFound {
                kind: R::KIND.as_str(),
            });
        }
        Ok(record)
    }

    /// List every record of one kind owned by `owner`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend or decoding failures.
    pub async fn list<R: Record>(&self, owner: &str) -> Result<Vec<R>, StoreError> {
        let prefix = collection_prefix::<R>(owner);
        let keys = self.storage.list(&prefix).await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = self.read::<R>(&key).await? {
                if record.owner() == owner {
                    records.push(record);
                }
            }
        }
        records.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
        Ok(records)
    }

    /// Insert or overwrite a record under its own owner and id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend or encoding failures.
    pub async fn put<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let key = record_key::<R>(record.owner(), record.id());
        self.write(&key, record).await?;
        debug!(kind = %R::KIND, id = %record.id(), "record written");
        Ok(())
    }

    /// Delete one record owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the id does not exist for this owner.
    /// - [`StoreError::Storage`] on backend failures.
    pub async fn delete<R: Record>(&self, owner: &str, id: Uuid) -> Result<(), StoreError> {
        self.get::<R>(owner, id).await?;
        self.storage.delete(&record_key::<R>(owner, id)).await?;
        debug!(kind = %R::KIND, %id, "record deleted");
        Ok(())
    }

    /// Load the settings document for `owner`, or the defaults if none was
    /// saved yet.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnsupportedVersion`] if the document was written by
    ///   a newer schema.
    /// - [`StoreError::Serialization`] / [`StoreError::Storage`] otherwise.
    pub async fn get_settings(&self, owner: &str) -> Result<Settings, StoreError> {
        let Some(settings) = self.read::<Settings>(&settings_key(owner)).await? else {
            return Ok(Settings::default());
        };
        if settings.version > SETTINGS_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_VERSION,
            });
        }
        Ok(Settings {
            version: SETTINGS_VERSION,
            ..settings
        })
    }

    /// Save the settings document for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend or encoding failures.
    pub async fn put_settings(&self, owner: &str, settings: &Settings) -> Result<(), StoreError> {
        self.write(&settings_key(owner), settings).await?;
        debug!(kind = %RecordKind::Settings, "settings written");
        Ok(())
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.storage.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization {
                key: key.to_owned(),
                reason: e.to_string(),
            })
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;
        self.storage.put(key, &bytes).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

fn collection_prefix<R: Record>(owner: &str) -> String {
    format!("users/{owner}/{}/", R::COLLECTION)
}

fn record_key<R: Record>(owner: &str, id: Uuid) -> String {
    format!("{}{id}", collection_prefix::<R>(owner))
}

fn settings_key(owner: &str) -> String {
    format!("users/{owner}/settings")
}
