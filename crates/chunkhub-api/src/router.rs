//! Route definitions for the ChunkHub HTTP API.
//!
//! All routes are mounted under `/api`. The router receives `AppState`
//! and passes it to all handlers via Axum's `State` extractor.

use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Allowance for multipart boundaries and metadata fields.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let storage = &state.config.storage;
    let chunk_limit = storage
        .max_chunk_size_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let file_limit = storage
        .max_upload_size_bytes
        .saturating_mul(storage.max_files_per_request as u64)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let timeout = Duration::from_secs(state.config.server.request_timeout_seconds);

    let api_routes = Router::new()
        .merge(chunk_routes().layer(DefaultBodyLimit::max(byte_limit(chunk_limit))))
        .merge(file_routes().layer(DefaultBodyLimit::max(byte_limit(file_limit))))
        .merge(health_routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors::build_cors_layer(&state.config.server.cors))
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Chunk upload, session lookup, and merge
fn chunk_routes() -> Router<AppState> {
    Router::new()
        .route("/chunk", get(handlers::chunk::list_sessions))
        .route("/chunk/upload", post(handlers::chunk::upload_chunk))
        .route("/chunk/merge", post(handlers::chunk::merge_chunks))
        .route(
            "/chunk/{file_id}",
            get(handlers::chunk::get_chunk_info).delete(handlers::chunk::discard_session),
        )
        .route(
            "/chunk/{file_id}/{chunk_index}",
            put(handlers::chunk::put_chunk),
        )
}

/// File records, single-request uploads, and downloads
fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/file", get(handlers::file::list_files))
        .route("/file/upload", post(handlers::file::simple_upload))
        .route("/file/uploads", post(handlers::file::simple_uploads))
        .route("/file/info/{filename}", get(handlers::file::file_info))
        .route(
            "/file/download/{filename}",
            get(handlers::file::download_file),
        )
        .route(
            "/file/{filename}",
            delete(handlers::file::delete_file),
        )
}

/// Health check
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

fn byte_limit(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}
