//! Chunked upload of a local file.

use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use super::files::FileRow;
use crate::output::{self, OutputFormat};
use chunkhub_core::error::AppError;
use chunkhub_core::types::chunk::ChunkInfo;

/// Arguments for the upload command
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Local file to upload
    pub path: PathBuf,

    /// Chunk size in bytes
    #[arg(long, default_value_t = 5 * 1024 * 1024)]
    pub chunk_size: u64,

    /// Upload identifier (random when omitted)
    #[arg(long)]
    pub file_id: Option<String>,

    /// Name to record instead of the local file name
    #[arg(long)]
    pub name: Option<String>,

    /// MIME type to record
    #[arg(long, default_value = "application/octet-stream")]
    pub mimetype: String,
}

/// Number of chunks needed to carry `total` bytes.
fn chunk_count(total: u64, chunk_size: u64) -> Result<u32, AppError> {
    if chunk_size == 0 {
        return Err(AppError::validation("Chunk size must be positive"));
    }
    if total == 0 {
        return Err(AppError::validation("Cannot upload an empty file in chunks"));
    }
    u32::try_from(total.div_ceil(chunk_size))
        .map_err(|_| AppError::validation("Chunk size is too small for this file"))
}

/// Execute the upload command
pub async fn execute(
    args: &UploadArgs,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let service = super::open_upload_service(&config).await?;

    let originalname = match &args.name {
        Some(name) => name.clone(),
        None => args
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::validation("Path has no file name"))?,
    };

    let mut file = tokio::fs::File::open(&args.path).await?;
    let total_size = file.metadata().await?.len();
    let total_chunks = chunk_count(total_size, args.chunk_size)?;
    let file_id = args
        .file_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let mut remaining = total_size;
    for chunk_index in 0..total_chunks {
        let len = remaining.min(args.chunk_size);
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf).await?;
        remaining -= len;

        let info = ChunkInfo {
            file_id: file_id.clone(),
            chunk_index,
            total_chunks,
            total_size,
            originalname: originalname.clone(),
            mimetype: args.mimetype.clone(),
            md5: None,
        };
        service.upload_chunk(info, Bytes::from(buf)).await?;
    }

    let record = service.merge(&file_id).await?;
    output::print_success(&format!(
        "Uploaded {originalname} as {} ({total_chunks} chunks)",
        record.filename
    ));
    output::print_item(&FileRow::from(&record), format);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(6, 2).unwrap(), 3);
        assert_eq!(chunk_count(7, 2).unwrap(), 4);
        assert_eq!(chunk_count(1, 1024).unwrap(), 1);
        assert!(chunk_count(0, 2).is_err());
        assert!(chunk_count(6, 0).is_err());
        assert!(chunk_count(u64::MAX, 1).is_err());
    }
}
