//! Session routes: `POST /auth/logout`
//!
//! Logging out revokes the presented bearer token. The client drops its
//! session key at the same time, so envelopes fetched before logout can no
//! longer be opened.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Router};
use tracing::info;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/auth/logout", post(logout))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    state.token_store.revoke_hash(&auth.token_hash).await?;
    info!(user = %auth.user_id, "logged out");
    Ok(StatusCode::NO_CONTENT)
}
