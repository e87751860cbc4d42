//! Error types for the `InfraVault` client.

use infravault_core::error::CryptoError;

/// All errors that can occur when using the `InfraVault` client.
///
/// Decryption and network failures are separate, recoverable variants: a
/// caller can retry either without discarding anything the user typed.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Missing or invalid client configuration.
    #[error("infravault config error: {0}")]
    Config(String),

    /// Bearer token missing, invalid or expired (401).
    #[error("infravault auth error: {0}")]
    Unauthorized(String),

    /// The record does not exist for this user (404).
    #[error("infravault: {0}")]
    NotFound(String),

    /// The API rejected the request.
    #[error("infravault API error {status} ({code}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Machine-readable error code, e.g. `ambiguous_secret_update`.
        code: String,
        /// Human-readable message from the API.
        message: String,
    },

    /// An envelope could not be opened with the session key.
    #[error("decryption failed: {0}")]
    Decryption(#[source] CryptoError),

    /// The OS could not supply randomness for a new session key.
    #[error("cannot generate session key: {0}")]
    KeyGeneration(#[source] CryptoError),

    /// A typed secret equals the keep sentinel and would be ignored.
    #[error("value for '{field}' is reserved; choose a different secret")]
    SentinelCollision {
        /// The form field holding the value.
        field: String,
    },

    /// Network, timeout or HTTP client error.
    #[error("infravault network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("infravault json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// The API error code, if the server returned one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            Self::Unauthorized(_) => Some("unauthorized"),
            Self::NotFound(_) => Some("not_found"),
            _ => None,
        }
    }
}

/// Failure of the volatile slot that holds the session key.
#[derive(Debug, thiserror::Error)]
#[error("session storage unavailable: {reason}")]
pub struct SessionStorageError {
    pub reason: String,
}
