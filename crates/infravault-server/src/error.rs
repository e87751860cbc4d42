//! HTTP error types for `InfraVault` server.
//!
//! Maps domain errors from `infravault-core` into HTTP responses. Every
//! error produces a JSON body with a machine-readable `error` code and a
//! human-readable `message`. Internal failures are logged in full and
//! answered with a generic message.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use infravault_core::error::{CryptoError, MergeError, RevealError, StoreError, TokenError};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Missing, invalid or expired bearer token.
    Unauthorized(String),
    /// Record does not exist or belongs to someone else.
    NotFound(String),
    /// Client sent invalid input; `code` is the stable `error` value.
    BadRequest { code: &'static str, message: String },
    /// Storage or crypto failure. The detail is logged, never returned.
    Internal(String),
}

impl AppError {
    /// Shorthand for a generic `bad_request`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: "bad_request",
            message: message.into(),
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            Self::Internal(detail) => {
                error!(detail = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        (status, axum::Json(ErrorBody { error: code, message })).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Serialization { .. }
            | StoreError::UnsupportedVersion { .. }
            | StoreError::Storage(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotFound | TokenError::Expired { .. } => {
                Self::Unauthorized("invalid or expired token".to_owned())
            }
            TokenError::InvalidUser { .. } => Self::bad_request(err.to_string()),
            TokenError::Serialization { .. } | TokenError::Storage(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        Self::BadRequest {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKey { .. } => Self::BadRequest {
                code: "invalid_reveal_key",
                message: "x-reveal-key must be a base64-encoded 256-bit key".to_owned(),
            },
            CryptoError::RandomUnavailable { .. }
            | CryptoError::Encryption { .. }
            | CryptoError::Decryption { .. }
            | CryptoError::MalformedEnvelope { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<RevealError> for AppError {
    fn from(err: RevealError) -> Self {
        match err {
            RevealError::Store(inner) => inner.into(),
            RevealError::Crypto(inner) => inner.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        // A malformed id can never name an owned record.
        Self::NotFound("not found".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use infravault_core::merge::MAX_SECRET_LEN;

    use super::*;

    #[test]
    fn merge_errors_keep_their_code() {
        let err: AppError = MergeError::TooLong {
            field: "password",
            max: MAX_SECRET_LEN,
        }
        .into();
        assert!(matches!(
            err,
            AppError::BadRequest {
                code: "secret_too_long",
                ..
            }
        ));
    }

    #[test]
    fn internal_errors_hide_detail() {
        let response = AppError::Internal("disk on fire at /var/lib".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn expired_and_unknown_tokens_look_alike() {
        let a: AppError = TokenError::NotFound.into();
        let b: AppError = TokenError::Expired {
            expired_at: "2026-01-01T00:00:00Z".to_owned(),
        }
        .into();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }
}
