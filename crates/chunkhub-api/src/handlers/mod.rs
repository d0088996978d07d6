//! Route handlers organized by domain.

pub mod chunk;
pub mod file;
pub mod health;

use axum::extract::multipart::MultipartError;

use chunkhub_core::error::AppError;

/// Malformed multipart bodies are client errors.
pub(crate) fn multipart_error(e: MultipartError) -> AppError {
    AppError::validation(format!("Multipart error: {}", e.body_text()))
}
