use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;

use super::errors::ApiError;
use crate::auth::extractors::{AppState, Owner};
use crate::repositories::FileRepository;
use crate::services::Analytics;

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new().route("/", get(get_analytics));

    Ok(router)
}

async fn get_analytics(State(state): State<AppState>, owner: Owner) -> Result<Json<Analytics>, ApiError> {
    let files = state.store.list_files(owner.0).await?;
    Ok(Json(Analytics::from_files(&files, Utc::now())))
}
