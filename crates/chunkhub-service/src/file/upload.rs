//! Upload service: chunked and single-request upload flows.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use chunkhub_core::config::storage::StorageConfig;
use chunkhub_core::error::AppError;
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::catalog::FileCatalog;
use chunkhub_core::traits::storage::StorageProvider;
use chunkhub_core::types::chunk::{ChunkInfo, ChunkReceipt, UploadSession, check_file_id};
use chunkhub_core::types::record::FileRecord;
use chunkhub_storage::chunked::{ChunkStore, MergeEngine};

/// MIME type recorded when the client does not send one.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A complete file delivered in one request.
#[derive(Debug, Clone)]
pub struct SimpleUpload {
    /// Client-side file name.
    pub originalname: String,
    /// MIME type, if the client reported one.
    pub mimetype: Option<String>,
    /// File content bytes.
    pub data: Bytes,
}

/// Handles chunk uploads, merges, single-request uploads, and record
/// management.
#[derive(Debug, Clone)]
pub struct UploadService {
    /// Chunk store for uploads in progress.
    store: ChunkStore,
    /// Merge engine publishing finished uploads.
    merger: MergeEngine,
    /// Storage provider holding artifacts.
    provider: Arc<dyn StorageProvider>,
    /// Catalog of finished files.
    catalog: Arc<dyn FileCatalog>,
    /// Storage configuration.
    config: StorageConfig,
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        catalog: Arc<dyn FileCatalog>,
        config: StorageConfig,
    ) -> Self {
        let store = ChunkStore::new(Arc::clone(&provider), &config);
        let merger = MergeEngine::new(
            store.clone(),
            Arc::clone(&provider),
            Arc::clone(&catalog),
            &config,
        );
        Self {
            store,
            merger,
            provider,
            catalog,
            config,
        }
    }

    /// Storage configuration in use.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Clears merge output left by a previous process. Call before serving.
    pub async fn recover(&self) -> AppResult<usize> {
        self.merger.sweep_staging().await
    }

    /// Stores one chunk of an upload.
    ///
    /// The metadata must agree with what earlier chunks of the same
    /// `fileId` declared; a disagreement is rejected before anything is
    /// written. Of two concurrent first chunks that disagree, exactly one is
    /// accepted.
    pub async fn upload_chunk(&self, info: ChunkInfo, data: Bytes) -> AppResult<ChunkReceipt> {
        info.validate()?;

        if info.total_size > self.config.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "File exceeds maximum upload size of {} bytes",
                self.config.max_upload_size_bytes
            )));
        }
        if data.is_empty() {
            return Err(AppError::validation("Chunk payload is empty"));
        }
        if data.len() as u64 > self.config.max_chunk_size_bytes {
            return Err(AppError::validation(format!(
                "Chunk exceeds maximum chunk size of {} bytes",
                self.config.max_chunk_size_bytes
            )));
        }

        let shared = self.store.locks().shared(&info.file_id).await;
        let (_guard, stored) = match self.store.get_chunk_info(&info.file_id).await? {
            Some(stored) => (shared, Some(stored)),
            None => {
                // The first chunk fixes the upload's metadata, so it is stored alone.
                drop(shared);
                let exclusive = self.store.locks().exclusive(&info.file_id).await;
                let stored = self.store.get_chunk_info(&info.file_id).await?;
                (exclusive, stored)
            }
        };

        if let Some(stored) = stored
            && let Some(field) = info.conflicting_field(&stored)
        {
            return Err(AppError::conflict(format!(
                "Chunk {} of '{}' disagrees with the upload on {field}",
                info.chunk_index, info.file_id
            )));
        }

        let size = data.len() as u64;
        self.store
            .save_chunk(&info.file_id, info.chunk_index, data, &info)
            .await?;

        info!(
            file_id = %info.file_id,
            chunk_index = info.chunk_index,
            total_chunks = info.total_chunks,
            bytes = size,
            "Chunk uploaded"
        );

        Ok(ChunkReceipt {
            file_id: info.file_id,
            chunk_index: info.chunk_index,
            size,
        })
    }

    /// Latest metadata of an upload in progress.
    pub async fn chunk_info(&self, file_id: &str) -> AppResult<Option<ChunkInfo>> {
        check_file_id(file_id)?;
        self.store.get_chunk_info(file_id).await
    }

    /// Merges a finished upload into one file and records it.
    pub async fn merge(&self, file_id: &str) -> AppResult<FileRecord> {
        check_file_id(file_id)?;
        self.merger.merge(file_id).await
    }

    /// Looks up a finished file by its generated name.
    pub async fn file_info(&self, filename: &str) -> AppResult<FileRecord> {
        self.catalog
            .find_by_name(filename)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File '{filename}' not found")))
    }

    /// Performs a single-request upload.
    pub async fn simple_upload(&self, upload: SimpleUpload) -> AppResult<FileRecord> {
        if upload.originalname.trim().is_empty() {
            return Err(AppError::validation("File name must not be empty"));
        }
        if upload.data.len() as u64 > self.config.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "File exceeds maximum upload size of {} bytes",
                self.config.max_upload_size_bytes
            )));
        }

        let created_at = Utc::now();
        let prefix = Uuid::new_v4().simple().to_string();
        let filename = FileRecord::generate_filename(&prefix, created_at, &upload.originalname);
        let path = self.merger.artifact_path(&filename);
        let size = upload.data.len() as u64;

        self.provider.write(&path, upload.data).await?;

        let record = FileRecord {
            filename,
            originalname: upload.originalname,
            mimetype: upload
                .mimetype
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            size,
            path,
            md5: None,
            created_at,
        };

        let record = match self.catalog.append(record.clone()).await {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = self.provider.delete(&record.path).await {
                    warn!(path = %record.path, error = %cleanup, "Failed to remove unrecorded file");
                }
                return Err(e);
            }
        };

        info!(
            filename = %record.filename,
            bytes = record.size,
            "Simple upload completed"
        );

        Ok(record)
    }

    /// Performs a multi-file single-request upload, in order.
    pub async fn simple_uploads(&self, uploads: Vec<SimpleUpload>) -> AppResult<Vec<FileRecord>> {
        if uploads.is_empty() {
            return Err(AppError::validation("No files were provided"));
        }
        if uploads.len() > self.config.max_files_per_request {
            return Err(AppError::validation(format!(
                "At most {} files may be uploaded at once",
                self.config.max_files_per_request
            )));
        }

        let mut records = Vec::with_capacity(uploads.len());
        for upload in uploads {
            records.push(self.simple_upload(upload).await?);
        }
        Ok(records)
    }

    /// Deletes a finished file and its record.
    pub async fn delete_file(&self, filename: &str) -> AppResult<FileRecord> {
        let record = self.file_info(filename).await?;

        self.provider.delete(&record.path).await?;
        self.catalog.remove(filename).await?;

        info!(filename, "File deleted");
        Ok(record)
    }

    /// All finished files in the order they were recorded.
    pub async fn list_files(&self) -> AppResult<Vec<FileRecord>> {
        self.catalog.list().await
    }

    /// Uploads that have a working area but were never merged.
    pub async fn list_sessions(&self) -> AppResult<Vec<UploadSession>> {
        self.store.list_sessions().await
    }

    /// Discards an abandoned upload and all of its chunks.
    pub async fn discard_session(&self, file_id: &str) -> AppResult<()> {
        check_file_id(file_id)?;
        let _guard = self.store.locks().exclusive(file_id).await;

        if !self.store.has_session(file_id).await? {
            return Err(AppError::not_found(format!(
                "No upload session found for fileId '{file_id}'"
            )));
        }

        self.store.purge(file_id).await?;
        info!(file_id, "Upload session discarded");
        Ok(())
    }
}
