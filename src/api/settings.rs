use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};

use super::errors::ApiError;
use crate::auth::extractors::{AppState, Owner};
use crate::models::{Settings, SettingsUpdate};

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new().route("/", get(get_settings).patch(update_settings));

    Ok(router)
}

async fn get_settings(State(state): State<AppState>, owner: Owner) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.settings.get(owner.0).await?))
}

async fn update_settings(
    State(state): State<AppState>,
    owner: Owner,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.settings.update(owner.0, update).await?))
}
