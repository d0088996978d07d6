//! File record, single-request upload, and download handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use chunkhub_core::error::AppError;
use chunkhub_service::file::{ByteRange, SimpleUpload};

use crate::error::ApiError;
use crate::handlers::multipart_error;
use crate::state::AppState;

/// GET /api/file
pub async fn list_files(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let files = state.upload_service.list_files().await?;
    Ok(Json(serde_json::json!({ "success": true, "data": files })))
}

/// GET /api/file/info/{filename}
pub async fn file_info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state.upload_service.file_info(&filename).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": record })))
}

/// GET /api/file/download/{filename}: honours a single `Range: bytes=` range
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);

    let download = state.download_service.open(&filename, range).await?;
    let content_length = download.content_length();

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, download.record.mimetype.as_str())
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&download.record.originalname),
        );

    builder = match download.range {
        Some((start, end)) => builder.status(StatusCode::PARTIAL_CONTENT).header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{}", download.total),
        ),
        None => builder.status(StatusCode::OK),
    };

    let response = builder
        .body(Body::from_stream(download.stream))
        .map_err(|e| AppError::internal(format!("Response build failed: {e}")))?;
    Ok(response)
}

/// POST /api/file/upload: single multipart `file`
pub async fn simple_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let upload = collect_files(multipart, "file")
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::validation("file is required"))?;

    let record = state.upload_service.simple_upload(upload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": record })),
    ))
}

/// POST /api/file/uploads: several multipart `files`
pub async fn simple_uploads(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let uploads = collect_files(multipart, "files").await?;
    let records = state.upload_service.simple_uploads(uploads).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": records })),
    ))
}

/// DELETE /api/file/{filename}
pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state.upload_service.delete_file(&filename).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": record })))
}

async fn collect_files(mut multipart: Multipart, field_name: &str) -> Result<Vec<SimpleUpload>, AppError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            continue;
        }
        let originalname = field.file_name().unwrap_or_default().to_string();
        let mimetype = field.content_type().map(String::from);
        let data = field.bytes().await.map_err(multipart_error)?;
        uploads.push(SimpleUpload {
            originalname,
            mimetype,
            data,
        });
    }

    Ok(uploads)
}

/// Parse a single `bytes=start-end` or `bytes=start-` range.
///
/// Suffix ranges, multiple ranges, and other units yield `None` and the
/// whole file is served.
fn parse_range(value: &str) -> Option<ByteRange> {
    let spec = value.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse().ok()?),
    };

    Some(ByteRange { start, end })
}

fn content_disposition(originalname: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(originalname, NON_ALPHANUMERIC)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range("bytes=2-3"),
            Some(ByteRange {
                start: 2,
                end: Some(3)
            })
        );
        assert_eq!(
            parse_range("bytes=10-"),
            Some(ByteRange {
                start: 10,
                end: None
            })
        );
        assert_eq!(parse_range("bytes=-5"), None);
        assert_eq!(parse_range("bytes=0-1,4-5"), None);
        assert_eq!(parse_range("items=0-1"), None);
        assert_eq!(parse_range("bytes=a-b"), None);
    }

    #[test]
    fn test_content_disposition_encodes_name() {
        assert_eq!(
            content_disposition("my file.txt"),
            "attachment; filename*=UTF-8''my%20file%2Etxt"
        );
    }
}
