//! File catalog persisted as a single JSON list.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::catalog::FileCatalog;
use chunkhub_core::types::record::FileRecord;

/// Catalog holding every [`FileRecord`] in memory and mirroring the list to
/// a JSON file.
///
/// Each mutation rewrites the whole file through a temporary sibling and a
/// rename, so readers of the file never see a partial list.
#[derive(Debug)]
pub struct JsonFileCatalog {
    path: PathBuf,
    records: RwLock<Vec<FileRecord>>,
}

impl JsonFileCatalog {
    /// Load the catalog at `path`. A missing or empty file is an empty catalog.
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        let records = match fs::read(&path).await {
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(raw) => serde_json::from_slice::<Vec<FileRecord>>(&raw).map_err(|e| {
                AppError::with_source(
                    ErrorKind::Serialization,
                    format!("Corrupt file catalog: {}", path.display()),
                    e,
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read file catalog: {}", path.display()),
                    e,
                ));
            }
        };

        info!(path = %path.display(), records = records.len(), "Opened file catalog");

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[FileRecord]) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create catalog directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let encoded = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, &encoded).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write catalog: {}", tmp.display()),
                e,
            )
        })?;
        fs::rename(&tmp, &self.path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to replace catalog: {}", self.path.display()),
                e,
            )
        })?;

        debug!(records = records.len(), "Persisted file catalog");
        Ok(())
    }
}

#[async_trait]
impl FileCatalog for JsonFileCatalog {
    async fn append(&self, record: FileRecord) -> AppResult<FileRecord> {
        let mut records = self.records.write().await;

        if records.iter().any(|r| r.filename == record.filename) {
            return Err(AppError::conflict(format!(
                "A file named '{}' is already recorded",
                record.filename
            )));
        }

        records.push(record.clone());
        if let Err(e) = self.persist(&records).await {
            records.pop();
            return Err(e);
        }

        Ok(record)
    }

    async fn find_by_name(&self, filename: &str) -> AppResult<Option<FileRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.filename == filename).cloned())
    }

    async fn remove(&self, filename: &str) -> AppResult<bool> {
        let mut records = self.records.write().await;

        let Some(position) = records.iter().position(|r| r.filename == filename) else {
            return Ok(false);
        };

        let removed = records.remove(position);
        if let Err(e) = self.persist(&records).await {
            records.insert(position, removed);
            return Err(e);
        }

        Ok(true)
    }

    async fn list(&self) -> AppResult<Vec<FileRecord>> {
        Ok(self.records.read().await.clone())
    }
}
