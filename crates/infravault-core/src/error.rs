//! Error types for `infravault-core`.
//!
//! Each variant carries enough context to diagnose the problem without a
//! debugger. Nothing here ever includes secret values or key material, only
//! field names, record identifiers, or operation descriptions.

use infravault_storage::StorageError;

/// Errors from the envelope codec and session key handling.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The OS random number generator could not produce bytes.
    #[error("secure random generation unavailable: {reason}")]
    RandomUnavailable { reason: String },

    /// A session key was not valid base64 or not 256 bits long.
    #[error("invalid session key: {reason}")]
    InvalidKey { reason: String },

    /// AES-256-GCM encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// The authentication tag did not verify (wrong key, tampered or corrupted envelope).
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// An envelope component was not valid base64 or had the wrong length.
    #[error("malformed envelope field '{field}': {reason}")]
    MalformedEnvelope { field: &'static str, reason: String },
}

/// Errors from the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The record does not exist for this owner.
    ///
    /// Returned both for ids that were never created and for ids owned by
    /// another user; callers cannot tell the two apart.
    #[error("{kind} not found")]
    NotFound { kind: &'static str },

    /// A stored document could not be encoded or decoded.
    #[error("failed to (de)serialize '{key}': {reason}")]
    Serialization { key: String, reason: String },

    /// The settings document was written by a newer schema.
    #[error("unsupported settings version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The storage backend failed.
    #[error("record storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from bearer token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No token with this value exists (or it was revoked).
    #[error("token not found")]
    NotFound,

    /// A user id contained characters outside `[A-Za-z0-9_-]`.
    #[error("invalid user id: {reason}")]
    InvalidUser { reason: String },

    /// The token has expired.
    #[error("token expired at {expired_at}")]
    Expired { expired_at: String },

    /// A token entry could not be encoded or decoded.
    #[error("token serialization failed: {reason}")]
    Serialization { reason: String },

    /// The storage backend failed.
    #[error("token storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Rejections from the write-path merge of a create or update payload.
///
/// Each variant maps to a stable, machine-readable code via [`MergeError::code`]
/// so clients can attach the error to the right form field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The payload value for a secret field was not a string.
    #[error("secret field '{field}' must be a string")]
    InvalidValue { field: &'static str },

    /// The payload carried an explicit `null`, which could mean keep or clear.
    #[error("secret field '{field}' is null; send \"__KEEP__\" to keep it or \"\" to clear it")]
    Ambiguous { field: &'static str },

    /// The new secret value exceeds the size limit.
    #[error("secret field '{field}' exceeds {max} bytes")]
    TooLong { field: &'static str, max: usize },

    /// A required plain field was missing or empty.
    #[error("field '{field}' is required")]
    Required { field: &'static str },
}

impl MergeError {
    /// Machine-readable error code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidValue { .. } => "invalid_secret_value",
            Self::Ambiguous { .. } => "ambiguous_secret_update",
            Self::TooLong { .. } => "secret_too_long",
            Self::Required { .. } => "missing_field",
        }
    }

    /// The payload field the rejection applies to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidValue { field }
            | Self::Ambiguous { field }
            | Self::TooLong { field, .. }
            | Self::Required { field } => field,
        }
    }
}

/// Errors from the reveal service.
#[derive(Debug, thiserror::Error)]
pub enum RevealError {
    /// The record lookup failed (including not-found / not-owned).
    #[error("reveal lookup failed: {0}")]
    Store(#[from] StoreError),

    /// Encrypting a secret for the session failed.
    #[error("reveal encryption failed: {0}")]
    Crypto(#[from] CryptoError),
}
