use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

use super::errors::ApiError;
use crate::auth::extractors::{AppState, Owner};
use crate::models::{FileRecord, Table};
use crate::repositories::FileRepository;
use crate::services::{replace_table, resolve_mime_type, stored_name, validate_upload, Upload, MAX_FILE_SIZE};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    #[serde(alias = "modifiedData")]
    pub table_data: Option<Table>,
    pub version: Option<i64>,
}

pub async fn create_router() -> Result<Router<AppState>> {
    let router = Router::new()
        .route(
            "/upload",
            // Oversized bodies up to twice the limit still reach validation
            // and get a JSON 413.
            post(upload_file).layer(DefaultBodyLimit::max(MAX_FILE_SIZE * 2)),
        )
        .route("/", get(list_files))
        .route("/{id}", get(get_file).patch(update_file).delete(delete_file))
        .route("/{id}/approve", post(approve_file))
        .route("/{id}/export", get(export_file))
        .route("/{id}/document", get(download_document));

    Ok(router)
}

async fn owned_file(state: &AppState, owner: Owner, id: i64) -> Result<FileRecord, ApiError> {
    state
        .store
        .get_file(id)
        .await?
        .filter(|record| record.owner_id == owner.0)
        .ok_or_else(|| ApiError::NotFound(format!("File {} not found", id)))
}

fn stored_path(state: &AppState, record: &FileRecord) -> PathBuf {
    state.upload_dir.join(&record.stored_name)
}

async fn upload_file(
    State(state): State<AppState>,
    owner: Owner,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<FileRecord>), ApiError> {
    let original_name = query.filename.unwrap_or_default();
    validate_upload(&original_name, body.len())?;

    let declared = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let mime_type = resolve_mime_type(&original_name, declared);
    let stored = stored_name(&original_name);

    tokio::fs::create_dir_all(&state.upload_dir).await?;
    let path = state.upload_dir.join(&stored);
    tokio::fs::write(&path, &body).await?;

    let upload = Upload { original_name, stored_name: stored, mime_type, bytes: body };
    match state.extraction.submit(owner.0, upload).await {
        Ok(record) => Ok((StatusCode::CREATED, Json(record))),
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                warn!("Could not remove orphaned upload {}: {}", path.display(), cleanup);
            }
            Err(e.into())
        }
    }
}

async fn list_files(State(state): State<AppState>, owner: Owner) -> Result<Json<Vec<FileRecord>>, ApiError> {
    let files = state.store.list_files(owner.0).await?;
    Ok(Json(files))
}

async fn get_file(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Result<Json<FileRecord>, ApiError> {
    Ok(Json(owned_file(&state, owner, id).await?))
}

async fn update_file(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateFileRequest>,
) -> Result<Json<FileRecord>, ApiError> {
    let table = payload
        .table_data
        .ok_or_else(|| ApiError::BadRequest("tableData is required".to_string()))?;

    let record = replace_table(state.store.as_ref(), owner.0, id, table, payload.version).await?;
    Ok(Json(record))
}

async fn delete_file(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let record = owned_file(&state, owner, id).await?;
    state.store.delete_file(id).await?;

    let path = stored_path(&state, &record);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }

    info!("File {} deleted by owner {}", id, owner.0);
    Ok(StatusCode::NO_CONTENT)
}

async fn approve_file(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Result<Json<FileRecord>, ApiError> {
    Ok(Json(state.approval.approve(owner.0, id).await?))
}

async fn export_file(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let record = owned_file(&state, owner, id).await?;
    let table = record
        .table_data
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("File has no extracted data".to_string()))?;

    let disposition = format!("attachment; filename=\"{}_extracted_data.csv\"", record.stem());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        table.to_csv(),
    )
        .into_response())
}

async fn download_document(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let record = owned_file(&state, owner, id).await?;
    let bytes = match tokio::fs::read(stored_path(&state, &record)).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("Document for file {} is no longer stored", id)));
        }
        Err(e) => return Err(e.into()),
    };

    let disposition = format!("inline; filename=\"{}\"", record.original_name.replace('"', ""));
    Ok((
        [(header::CONTENT_TYPE, record.mime_type.clone()), (header::CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response())
}
