//! Authentication middleware for `InfraVault`.
//!
//! Extracts the `Authorization: Bearer` token, validates it against the
//! token store, and injects an [`AuthContext`] into the request extensions.
//! Every owner-scoped lookup downstream uses `AuthContext::user_id`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// Authentication context injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The authenticated user; scopes every record lookup.
    pub user_id: String,
    /// Hash of the presented token (for logout and logs).
    pub token_hash: String,
}

/// Middleware that validates the bearer token.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_owned());

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return AppError::Unauthorized("missing bearer token".to_owned()).into_response();
    };

    match state.token_store.lookup(&token).await {
        Ok(entry) => {
            req.extensions_mut().insert(AuthContext {
                user_id: entry.user_id,
                token_hash: entry.token_hash,
            });
            next.run(req).await
        }
        Err(err) => {
            debug!(error = %err, "bearer token rejected");
            AppError::from(err).into_response()
        }
    }
}
