//! Errors raised by storage backends.
//!
//! Keys follow the record store's layout: `users/<owner>/servers/<id>`,
//! `users/<owner>/providers/<id>`, `users/<owner>/settings` and
//! `sys/tokens/<hash>`. Each variant names the key or prefix involved so a
//! failure can be traced to one owner's document. Values never appear in
//! these messages; they may hold unredacted secrets.

/// A backend could not complete an operation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The data directory (`INFRAVAULT_STORAGE_PATH`) could not be opened.
    #[error("cannot open data directory '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Loading the document under `key` failed.
    #[error("cannot load document '{key}': {reason}")]
    Read { key: String, reason: String },

    /// Saving the document under `key` failed.
    #[error("cannot save document '{key}': {reason}")]
    Write { key: String, reason: String },

    /// Removing the document under `key` failed.
    #[error("cannot remove document '{key}': {reason}")]
    Delete { key: String, reason: String },

    /// Scanning an owner's collection, e.g. `users/alice/servers/`, failed.
    #[error("cannot scan collection '{prefix}': {reason}")]
    List { prefix: String, reason: String },

    /// A key read back from disk was not UTF-8.
    #[error("stored key is not UTF-8: {reason}")]
    InvalidKey { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_document_but_not_its_value() {
        let err = StorageError::Write {
            key: "users/alice/servers/web-1".to_owned(),
            reason: "disk full".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "cannot save document 'users/alice/servers/web-1': disk full"
        );

        let err = StorageError::List {
            prefix: "users/bob/providers/".to_owned(),
            reason: "io".to_owned(),
        };
        assert!(err.to_string().contains("users/bob/providers/"));
    }
}
