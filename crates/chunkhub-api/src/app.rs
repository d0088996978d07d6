//! Application builder: wires storage, catalog, services, and router.

use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use tracing::{error, info};

use chunkhub_core::config::AppConfig;
use chunkhub_core::error::AppError;
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::catalog::FileCatalog;
use chunkhub_core::traits::storage::StorageProvider;
use chunkhub_service::file::{DownloadService, UploadService};
use chunkhub_storage::{JsonFileCatalog, LocalStorageProvider};

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
}

/// Opens storage and the catalog, recovers from an interrupted run, and
/// assembles the shared state.
pub async fn build_state(config: AppConfig) -> AppResult<AppState> {
    let storage_config = &config.storage;

    let storage: Arc<dyn StorageProvider> =
        Arc::new(LocalStorageProvider::new(&storage_config.data_root).await?);
    for dir in [
        &storage_config.chunks_dir,
        &storage_config.files_dir,
        &storage_config.staging_dir,
    ] {
        storage.create_dir(dir).await?;
    }

    let catalog: Arc<dyn FileCatalog> =
        Arc::new(JsonFileCatalog::open(storage_config.catalog_path()).await?);

    let upload_service = Arc::new(UploadService::new(
        Arc::clone(&storage),
        Arc::clone(&catalog),
        storage_config.clone(),
    ));
    upload_service.recover().await?;

    let download_service = Arc::new(DownloadService::new(
        Arc::clone(&storage),
        Arc::clone(&catalog),
    ));

    info!(
        data_root = %storage_config.data_root,
        provider = storage.provider_type(),
        "Storage initialized"
    );

    Ok(AppState {
        config: Arc::new(config),
        storage,
        upload_service,
        download_service,
        started_at: Utc::now(),
    })
}

/// Runs the ChunkHub server until a shutdown signal arrives.
pub async fn run_server(config: AppConfig) -> AppResult<()> {
    info!("Starting ChunkHub v{}", env!("CARGO_PKG_VERSION"));

    let addr = config.server.bind_address();
    let state = build_state(config).await?;
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    info!("ChunkHub server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    info!("ChunkHub server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
