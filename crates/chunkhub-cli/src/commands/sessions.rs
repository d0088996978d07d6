//! Upload session CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use chunkhub_core::error::AppError;
use chunkhub_core::types::chunk::UploadSession;

/// Arguments for session commands
#[derive(Debug, Args)]
pub struct SessionsArgs {
    /// Session subcommand
    #[command(subcommand)]
    pub command: SessionsCommand,
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionsCommand {
    /// List uploads that were never merged
    List,
    /// Discard an upload and its chunks
    Discard {
        /// Upload identifier
        file_id: String,
    },
}

/// Session display row
#[derive(Debug, Serialize, Tabled)]
struct SessionRow {
    /// Upload ID
    file_id: String,
    /// Client name
    original: String,
    /// Chunks stored / expected
    chunks: String,
    /// Last modified
    last_modified: String,
}

impl From<&UploadSession> for SessionRow {
    fn from(session: &UploadSession) -> Self {
        let (original, expected) = match &session.info {
            Some(info) => (info.originalname.clone(), info.total_chunks.to_string()),
            None => ("-".to_string(), "?".to_string()),
        };
        Self {
            file_id: session.file_id.clone(),
            original,
            chunks: format!("{}/{}", session.stored_chunks, expected),
            last_modified: session
                .last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Execute session commands
pub async fn execute(
    args: &SessionsArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let service = super::open_upload_service(&config).await?;

    match &args.command {
        SessionsCommand::List => {
            let sessions = service.list_sessions().await?;
            let rows: Vec<SessionRow> = sessions.iter().map(SessionRow::from).collect();
            output::print_list(&rows, format);
        }
        SessionsCommand::Discard { file_id } => {
            service.discard_session(file_id).await?;
            output::print_success(&format!("Discarded upload {file_id}"));
        }
    }

    Ok(())
}
