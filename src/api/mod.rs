pub mod analytics;
pub mod errors;
pub mod files;
pub mod settings;

use anyhow::Result;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::auth::extractors::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route("/status", get(status_handler))
        .nest("/files", files::create_router().await?)
        .nest("/settings", settings::create_router().await?)
        .nest("/analytics", analytics::create_router().await?);

    Ok(router)
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "API is running",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.startup_time.elapsed().as_secs(),
    })
}
