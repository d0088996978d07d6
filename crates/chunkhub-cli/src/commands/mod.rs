//! CLI command definitions and dispatch.

pub mod files;
pub mod serve;
pub mod sessions;
pub mod upload;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use chunkhub_core::config::AppConfig;
use chunkhub_core::error::AppError;
use chunkhub_service::file::UploadService;
use chunkhub_storage::{JsonFileCatalog, LocalStorageProvider};

/// ChunkHub: chunked file upload service
///
/// Commands other than `serve` work on the data root directly and should
/// not run while a server is using the same data root.
#[derive(Debug, Parser)]
#[command(name = "chunkhub", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file (defaults to config/ layered by CHUNKHUB_ENV)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the ChunkHub server
    Serve(serve::ServeArgs),
    /// Upload a local file in chunks and merge it
    Upload(upload::UploadArgs),
    /// Finished file management
    Files(files::FilesArgs),
    /// Unmerged upload session management
    Sessions(sessions::SessionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = self.config.as_deref();
        match &self.command {
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Upload(args) => upload::execute(args, config, self.format).await,
            Commands::Files(args) => files::execute(args, config, self.format).await,
            Commands::Sessions(args) => sessions::execute(args, config, self.format).await,
        }
    }
}

/// Helper: load configuration from an explicit file or the layered defaults
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, AppError> {
    match config_path {
        Some(path) => AppConfig::from_file(path),
        None => {
            let env = std::env::var("CHUNKHUB_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Helper: open the upload service on the configured data root
pub async fn open_upload_service(config: &AppConfig) -> Result<UploadService, AppError> {
    let storage = Arc::new(LocalStorageProvider::new(&config.storage.data_root).await?);
    let catalog = Arc::new(JsonFileCatalog::open(config.storage.catalog_path()).await?);
    Ok(UploadService::new(storage, catalog, config.storage.clone()))
}
