//! Chunk upload, session, and merge handlers.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use bytes::Bytes;
use validator::Validate;

use chunkhub_core::error::AppError;

use crate::dto::request::{ChunkQuery, ChunkUploadForm, MergeRequest};
use crate::error::ApiError;
use crate::handlers::multipart_error;
use crate::state::AppState;

/// POST /api/chunk/upload: multipart chunk with metadata fields
pub async fn upload_chunk(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let mut form = ChunkUploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let file_name = field.file_name().map(String::from);
            let content_type = field.content_type().map(String::from);
            let data = field.bytes().await.map_err(multipart_error)?;
            form.set_file(file_name, content_type, data);
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.set_text(&name, value);
        }
    }

    let (info, data) = form.into_parts()?;
    let receipt = state.upload_service.upload_chunk(info, data).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": receipt })),
    ))
}

/// PUT /api/chunk/{file_id}/{chunk_index}: raw chunk body, metadata in query
pub async fn put_chunk(
    State(state): State<AppState>,
    Path((file_id, chunk_index)): Path<(String, u32)>,
    Query(query): Query<ChunkQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let info = query.into_chunk_info(file_id, chunk_index);
    let receipt = state.upload_service.upload_chunk(info, body).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": receipt })),
    ))
}

/// GET /api/chunk/{file_id}
pub async fn get_chunk_info(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let info = state
        .upload_service
        .chunk_info(&file_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("No upload session for fileId '{file_id}'")))?;

    Ok(Json(serde_json::json!({ "success": true, "data": info })))
}

/// GET /api/chunk: uploads that were started but never merged
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = state.upload_service.list_sessions().await?;
    Ok(Json(serde_json::json!({ "success": true, "data": sessions })))
}

/// DELETE /api/chunk/{file_id}
pub async fn discard_session(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.upload_service.discard_session(&file_id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": { "fileId": file_id, "discarded": true }
    })))
}

/// POST /api/chunk/merge
pub async fn merge_chunks(
    State(state): State<AppState>,
    Json(req): Json<MergeRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    req.validate().map_err(AppError::from)?;

    let record = state.upload_service.merge(&req.file_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": record })),
    ))
}
