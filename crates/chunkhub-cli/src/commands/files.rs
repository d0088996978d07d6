//! Finished file CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use chunkhub_core::error::AppError;
use chunkhub_core::types::record::FileRecord;

/// Arguments for file commands
#[derive(Debug, Args)]
pub struct FilesArgs {
    /// File subcommand
    #[command(subcommand)]
    pub command: FilesCommand,
}

/// File subcommands
#[derive(Debug, Subcommand)]
pub enum FilesCommand {
    /// List finished files
    List,
    /// Show one file record
    Info {
        /// Generated file name
        filename: String,
    },
    /// Delete a file and its record
    Delete {
        /// Generated file name
        filename: String,
    },
}

/// File display row
#[derive(Debug, Serialize, Tabled)]
pub struct FileRow {
    /// Generated name
    pub filename: String,
    /// Client name
    pub original: String,
    /// MIME type
    pub mimetype: String,
    /// Size in bytes
    pub size: u64,
    /// Created
    pub created: String,
}

impl From<&FileRecord> for FileRow {
    fn from(record: &FileRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            original: record.originalname.clone(),
            mimetype: record.mimetype.clone(),
            size: record.size,
            created: record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Execute file commands
pub async fn execute(
    args: &FilesArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let service = super::open_upload_service(&config).await?;

    match &args.command {
        FilesCommand::List => {
            let records = service.list_files().await?;
            let rows: Vec<FileRow> = records.iter().map(FileRow::from).collect();
            output::print_list(&rows, format);
        }
        FilesCommand::Info { filename } => {
            let record = service.file_info(filename).await?;
            output::print_item(&FileRow::from(&record), format);
        }
        FilesCommand::Delete { filename } => {
            service.delete_file(filename).await?;
            output::print_success(&format!("Deleted {filename}"));
        }
    }

    Ok(())
}
