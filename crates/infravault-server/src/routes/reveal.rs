//! Reveal routes: `/reveal/*`
//!
//! Each call re-reads the caller's record, encrypts the present secret
//! fields under the session key from `x-reveal-key`, and returns only the
//! envelopes. The key lives for the duration of the request.

use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::HeaderName;
use axum::http::request::Parts;
use axum::routing::get;
use axum::{Extension, Json, Router};
use uuid::Uuid;

use infravault_core::crypto::SessionKey;
use infravault_core::reveal::{RevealResponse, RevealTarget};

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::state::AppState;

/// Header carrying the caller's base64 session key.
pub const REVEAL_KEY_HEADER: HeaderName = HeaderName::from_static("x-reveal-key");

/// Build the `/reveal` router.
///
/// Paths:
/// - `GET /reveal/servers/{id}` — `password`, `sshPassword`, `providerPassword`
/// - `GET /reveal/providers/{id}` — `password`
/// - `GET /reveal/settings/key` — WHOIS API key as `key`
/// - `GET /reveal/settings/bark-key` — Bark device key as `key`
/// - `GET /reveal/settings/smtp-password` — SMTP password as `password`
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reveal/servers/{id}", get(reveal_server))
        .route("/reveal/providers/{id}", get(reveal_provider))
        .route("/reveal/settings/key", get(reveal_whois_key))
        .route("/reveal/settings/bark-key", get(reveal_bark_key))
        .route("/reveal/settings/smtp-password", get(reveal_smtp_password))
}

/// The session key parsed from `x-reveal-key`.
pub struct RevealKey(pub SessionKey);

impl<S: Send + Sync> FromRequestParts<S> for RevealKey {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(&REVEAL_KEY_HEADER) else {
            return Err(AppError::BadRequest {
                code: "missing_reveal_key",
                message: "x-reveal-key header is required".to_owned(),
            });
        };
        let encoded = value.to_str().map_err(|_| AppError::BadRequest {
            code: "invalid_reveal_key",
            message: "x-reveal-key must be a base64-encoded 256-bit key".to_owned(),
        })?;
        Ok(Self(SessionKey::from_base64(encoded)?))
    }
}

async fn reveal(
    state: &AppState,
    auth: &AuthContext,
    target: RevealTarget,
    key: &SessionKey,
) -> Result<Json<RevealResponse>, AppError> {
    let response = state.reveal.reveal(&auth.user_id, target, key).await?;
    Ok(Json(response))
}

async fn reveal_server(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    RevealKey(key): RevealKey,
) -> Result<Json<RevealResponse>, AppError> {
    let Path(id) = id?;
    reveal(&state, &auth, RevealTarget::Server(id), &key).await
}

async fn reveal_provider(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    RevealKey(key): RevealKey,
) -> Result<Json<RevealResponse>, AppError> {
    let Path(id) = id?;
    reveal(&state, &auth, RevealTarget::Provider(id), &key).await
}

async fn reveal_whois_key(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    RevealKey(key): RevealKey,
) -> Result<Json<RevealResponse>, AppError> {
    reveal(&state, &auth, RevealTarget::WhoisKey, &key).await
}

async fn reveal_bark_key(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    RevealKey(key): RevealKey,
) -> Result<Json<RevealResponse>, AppError> {
    reveal(&state, &auth, RevealTarget::BarkKey, &key).await
}

async fn reveal_smtp_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    RevealKey(key): RevealKey,
) -> Result<Json<RevealResponse>, AppError> {
    reveal(&state, &auth, RevealTarget::SmtpPassword, &key).await
}
