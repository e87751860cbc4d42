//! Provider routes: `/providers`, `/providers/{id}`

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use infravault_core::merge::{NewProvider, ProviderPatch};
use infravault_core::model::{Provider, ProviderView};
use infravault_core::redact::Redact;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", get(list_providers).post(create_provider))
        .route(
            "/providers/{id}",
            get(get_provider)
                .patch(update_provider)
                .delete(delete_provider),
        )
}

async fn list_providers(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ProviderView>>, AppError> {
    let providers = state.record_store.list::<Provider>(&auth.user_id).await?;
    Ok(Json(
        providers.iter().map(|p| p.redact(&state.policy)).collect(),
    ))
}

async fn create_provider(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<NewProvider>, JsonRejection>,
) -> Result<(StatusCode, Json<ProviderView>), AppError> {
    let Json(payload) = payload?;
    let provider = payload.into_provider(&auth.user_id, Utc::now())?;
    state.record_store.put(&provider).await?;
    info!(user = %auth.user_id, id = %provider.id, "provider created");
    Ok((StatusCode::CREATED, Json(provider.redact(&state.policy))))
}

async fn get_provider(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ProviderView>, AppError> {
    let Path(id) = id?;
    let provider: Provider = state.record_store.get(&auth.user_id, id).await?;
    Ok(Json(provider.redact(&state.policy)))
}

async fn update_provider(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ProviderPatch>, JsonRejection>,
) -> Result<Json<ProviderView>, AppError> {
    let Path(id) = id?;
    let Json(patch) = payload?;

    let mut provider: Provider = state.record_store.get(&auth.user_id, id).await?;
    patch.apply(&mut provider, Utc::now())?;
    state.record_store.put(&provider).await?;
    info!(user = %auth.user_id, %id, "provider updated");
    Ok(Json(provider.redact(&state.policy)))
}

async fn delete_provider(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state
        .record_store
        .delete::<Provider>(&auth.user_id, id)
        .await?;
    info!(user = %auth.user_id, %id, "provider deleted");
    Ok(StatusCode::NO_CONTENT)
}
