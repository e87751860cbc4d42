//! Server routes: `/servers`, `/servers/{id}`
//!
//! Reads are serialized through the redaction policy. Writes go through the
//! secret merge rule, so a form that never saw a password can still save.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use infravault_core::merge::{NewServer, ServerPatch};
use infravault_core::model::{Provider, Server, ServerView};
use infravault_core::redact::Redact;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::state::AppState;

/// Build the server routes.
///
/// Paths:
/// - `GET    /servers` — list (redacted)
/// - `POST   /servers` — create
/// - `GET    /servers/{id}` — read (redacted)
/// - `PATCH  /servers/{id}` — merge-update
/// - `DELETE /servers/{id}` — delete
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/servers", get(list_servers).post(create_server))
        .route(
            "/servers/{id}",
            get(get_server).patch(update_server).delete(delete_server),
        )
}

async fn list_servers(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ServerView>>, AppError> {
    let servers = state.record_store.list::<Server>(&auth.user_id).await?;
    Ok(Json(
        servers.iter().map(|s| s.redact(&state.policy)).collect(),
    ))
}

async fn create_server(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<NewServer>, JsonRejection>,
) -> Result<(StatusCode, Json<ServerView>), AppError> {
    let Json(payload) = payload?;
    let server = payload.into_server(&auth.user_id, Utc::now())?;
    check_provider(&state, &auth, server.provider_id).await?;

    state.record_store.put(&server).await?;
    info!(user = %auth.user_id, id = %server.id, "server created");
    Ok((StatusCode::CREATED, Json(server.redact(&state.policy))))
}

async fn get_server(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ServerView>, AppError> {
    let Path(id) = id?;
    let server: Server = state.record_store.get(&auth.user_id, id).await?;
    Ok(Json(server.redact(&state.policy)))
}

async fn update_server(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ServerPatch>, JsonRejection>,
) -> Result<Json<ServerView>, AppError> {
    let Path(id) = id?;
    let Json(patch) = payload?;

    let mut server: Server = state.record_store.get(&auth.user_id, id).await?;
    patch.apply(&mut server, Utc::now())?;
    check_provider(&state, &auth, server.provider_id).await?;

    state.record_store.put(&server).await?;
    info!(user = %auth.user_id, %id, "server updated");
    Ok(Json(server.redact(&state.policy)))
}

async fn delete_server(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state.record_store.delete::<Server>(&auth.user_id, id).await?;
    info!(user = %auth.user_id, %id, "server deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// A linked provider must be one of the caller's own.
async fn check_provider(
    state: &AppState,
    auth: &AuthContext,
    provider_id: Option<Uuid>,
) -> Result<(), AppError> {
    let Some(provider_id) = provider_id else {
        return Ok(());
    };
    state
        .record_store
        .get::<Provider>(&auth.user_id, provider_id)
        .await
        .map(|_| ())
        .map_err(|err| match AppError::from(err) {
            AppError::NotFound(_) => AppError::bad_request("providerId does not name a provider"),
            other => other,
        })
}
