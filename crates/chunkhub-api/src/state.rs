//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use chunkhub_core::config::AppConfig;
use chunkhub_core::traits::storage::StorageProvider;
use chunkhub_service::file::{DownloadService, UploadService};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Storage provider for chunks and artifacts
    pub storage: Arc<dyn StorageProvider>,
    /// Chunked and single-request uploads, merges, records
    pub upload_service: Arc<UploadService>,
    /// Whole and ranged downloads
    pub download_service: Arc<DownloadService>,
    /// When this process started serving
    pub started_at: DateTime<Utc>,
}
