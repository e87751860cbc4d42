//! Settings routes: `GET /settings`, `PATCH /settings`

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::info;

use infravault_core::merge::SettingsPatch;
use infravault_core::model::SettingsView;
use infravault_core::redact::Redact;

use crate::error::AppError;
use crate::middleware::AuthContext;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/settings", get(get_settings).patch(update_settings))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<SettingsView>, AppError> {
    let settings = state.record_store.get_settings(&auth.user_id).await?;
    Ok(Json(settings.redact(&state.policy)))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> Result<Json<SettingsView>, AppError> {
    let Json(patch) = payload?;

    let mut settings = state.record_store.get_settings(&auth.user_id).await?;
    patch.apply(&mut settings)?;
    state
        .record_store
        .put_settings(&auth.user_id, &settings)
        .await?;

    info!(user = %auth.user_id, "settings updated");
    Ok(Json(settings.redact(&state.policy)))
}
