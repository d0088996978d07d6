//! Merge engine: concatenates a finished upload into one published file.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use chunkhub_core::config::storage::StorageConfig;
use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::catalog::FileCatalog;
use chunkhub_core::traits::storage::StorageProvider;
use chunkhub_core::types::chunk::check_file_id;
use chunkhub_core::types::record::FileRecord;

use super::store::ChunkStore;

/// Names tried before a merge gives up on finding a free artifact name.
const MAX_NAME_ATTEMPTS: usize = 4;

/// Streams chunks `0..totalChunks` into a staging object, publishes it under
/// the files directory, purges the working area, and records the result.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    store: ChunkStore,
    provider: Arc<dyn StorageProvider>,
    catalog: Arc<dyn FileCatalog>,
    files_dir: String,
    staging_dir: String,
}

impl MergeEngine {
    /// Create a new merge engine.
    pub fn new(
        store: ChunkStore,
        provider: Arc<dyn StorageProvider>,
        catalog: Arc<dyn FileCatalog>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            store,
            provider,
            catalog,
            files_dir: config.files_dir.trim_matches('/').to_string(),
            staging_dir: config.staging_dir.trim_matches('/').to_string(),
        }
    }

    /// Storage path of a published file.
    pub fn artifact_path(&self, filename: &str) -> String {
        format!("{}/{filename}", self.files_dir)
    }

    /// Merge the upload `file_id`.
    ///
    /// Holds the exclusive lock for `file_id` throughout, so a concurrent
    /// second merge observes the purged session and fails with `NotFound`.
    pub async fn merge(&self, file_id: &str) -> AppResult<FileRecord> {
        check_file_id(file_id)?;
        let _guard = self.store.locks().exclusive(file_id).await;

        let chunk_info = self.store.get_chunk_info(file_id).await?.ok_or_else(|| {
            AppError::not_found(format!("No upload session found for fileId '{file_id}'"))
        })?;

        let created_at = Utc::now();
        let filename = self
            .free_filename(file_id, created_at, &chunk_info.originalname)
            .await?;
        let staging_path = format!("{}/{}.part", self.staging_dir, Uuid::new_v4());
        let target_path = self.artifact_path(&filename);

        info!(
            file_id,
            total_chunks = chunk_info.total_chunks,
            filename = %filename,
            "Merging chunks"
        );

        let (chunks, status) = self.store.chunk_stream(file_id, chunk_info.total_chunks);
        let written = match self.provider.write_stream(&staging_path, chunks).await {
            Ok(written) => written,
            Err(e) => {
                self.discard(&staging_path).await;
                let failure = status.to_error(file_id).unwrap_or_else(|| {
                    AppError::with_source(
                        ErrorKind::MergeFailure,
                        format!("merge failed: could not write output for '{file_id}'"),
                        e,
                    )
                });
                warn!(file_id, error = %failure, "Merge aborted");
                return Err(failure);
            }
        };

        if let Err(e) = self.provider.rename(&staging_path, &target_path).await {
            self.discard(&staging_path).await;
            return Err(AppError::with_source(
                ErrorKind::MergeFailure,
                format!("merge failed: could not publish '{filename}'"),
                e,
            ));
        }

        if let Err(e) = self.store.purge(file_id).await {
            // Keep the session so the client can retry the merge.
            self.discard(&target_path).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to clean up chunks of '{file_id}'"),
                e,
            ));
        }

        if written != chunk_info.total_size {
            warn!(
                file_id,
                expected = chunk_info.total_size,
                written,
                "Merged size differs from declared totalSize"
            );
        }

        let record = FileRecord {
            filename,
            originalname: chunk_info.originalname,
            mimetype: chunk_info.mimetype,
            size: chunk_info.total_size,
            path: target_path,
            md5: chunk_info.md5,
            created_at,
        };

        let record = self.catalog.append(record).await.inspect_err(|e| {
            error!(file_id, error = %e, "Merged file could not be recorded");
        })?;

        info!(
            file_id,
            filename = %record.filename,
            bytes = written,
            "Merge complete"
        );

        Ok(record)
    }

    /// A generated artifact name not yet taken by a file or a record.
    ///
    /// The plain `{fileId}-{millis}-{name}` form is tried first; later
    /// attempts add a random suffix to the prefix.
    async fn free_filename(
        &self,
        file_id: &str,
        created_at: DateTime<Utc>,
        originalname: &str,
    ) -> AppResult<String> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let prefix = if attempt == 0 {
                file_id.to_string()
            } else {
                format!("{file_id}-{}", Uuid::new_v4().simple())
            };
            let filename = FileRecord::generate_filename(&prefix, created_at, originalname);

            let taken = self.provider.exists(&self.artifact_path(&filename)).await?
                || self.catalog.find_by_name(&filename).await?.is_some();
            if !taken {
                return Ok(filename);
            }
            warn!(file_id, filename = %filename, "Artifact name already taken");
        }

        Err(AppError::conflict(format!(
            "merge failed: no free file name for '{file_id}'"
        )))
    }

    /// Remove staging objects left behind by an interrupted merge.
    ///
    /// Only safe while no merge is running, i.e. at start-up.
    pub async fn sweep_staging(&self) -> AppResult<usize> {
        let mut removed = 0;
        for entry in self.provider.list(&self.staging_dir).await? {
            if !entry.is_directory && entry.path.ends_with(".part") {
                self.provider.delete(&entry.path).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            warn!(removed, "Removed stale merge output");
        }
        Ok(removed)
    }

    async fn discard(&self, path: &str) {
        if let Err(e) = self.provider.delete(path).await {
            warn!(path, error = %e, "Failed to remove merge output");
        }
    }
}
