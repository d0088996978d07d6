//! Chunk store: payloads and session metadata of uploads in progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use chunkhub_core::config::storage::StorageConfig;
use chunkhub_core::error::AppError;
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::storage::{ByteStream, StorageProvider};
use chunkhub_core::types::chunk::{ChunkInfo, UploadSession, check_file_id};

use super::lock::UploadLocks;

/// Name of the metadata file inside each working area.
const INFO_FILE: &str = "info.json";

/// Stores chunk payloads at `<chunks_dir>/<fileId>/<index>` and the latest
/// [`ChunkInfo`] at `<chunks_dir>/<fileId>/info.json`.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    provider: Arc<dyn StorageProvider>,
    chunks_dir: String,
    locks: UploadLocks,
}

/// Records the first chunk a [`ChunkStore::chunk_stream`] failed to read.
#[derive(Debug, Clone)]
pub struct ChunkReadStatus {
    failed: Arc<AtomicI64>,
}

impl Default for ChunkReadStatus {
    fn default() -> Self {
        Self {
            failed: Arc::new(AtomicI64::new(-1)),
        }
    }
}

impl ChunkReadStatus {
    /// Index of the first chunk that could not be opened or read.
    pub fn first_failed(&self) -> Option<u32> {
        u32::try_from(self.failed.load(Ordering::SeqCst)).ok()
    }

    /// The merge failure naming the first unreadable chunk, if any.
    pub fn to_error(&self, file_id: &str) -> Option<AppError> {
        self.first_failed().map(|index| {
            AppError::merge_failed(format!(
                "merge failed: chunk {index} of '{file_id}' could not be read"
            ))
        })
    }

    fn mark(&self, index: u32) {
        let _ = self.failed.compare_exchange(
            -1,
            i64::from(index),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

impl ChunkStore {
    /// Create a chunk store using the layout from `config`.
    pub fn new(provider: Arc<dyn StorageProvider>, config: &StorageConfig) -> Self {
        Self {
            provider,
            chunks_dir: config.chunks_dir.trim_matches('/').to_string(),
            locks: UploadLocks::new(),
        }
    }

    /// The per-upload lock table shared by writers and the merge engine.
    pub fn locks(&self) -> &UploadLocks {
        &self.locks
    }

    /// Working area of one upload.
    pub fn session_dir(&self, file_id: &str) -> String {
        format!("{}/{file_id}", self.chunks_dir)
    }

    /// Storage path of one chunk payload.
    pub fn chunk_path(&self, file_id: &str, chunk_index: u32) -> String {
        format!("{}/{file_id}/{chunk_index}", self.chunks_dir)
    }

    fn info_path(&self, file_id: &str) -> String {
        format!("{}/{file_id}/{INFO_FILE}", self.chunks_dir)
    }

    /// Persist one chunk and overwrite the session metadata with `info`.
    ///
    /// Re-sending an index replaces the earlier payload. No ordering or
    /// completeness check is made here.
    pub async fn save_chunk(
        &self,
        file_id: &str,
        chunk_index: u32,
        data: Bytes,
        info: &ChunkInfo,
    ) -> AppResult<()> {
        check_file_id(file_id)?;

        let size = data.len();
        self.provider
            .write(&self.chunk_path(file_id, chunk_index), data)
            .await?;

        let encoded = serde_json::to_vec(info)?;
        self.provider
            .write(&self.info_path(file_id), Bytes::from(encoded))
            .await?;

        debug!(file_id, chunk_index, bytes = size, "Stored chunk");
        Ok(())
    }

    /// Latest metadata recorded for `file_id`, or `None` when no session exists.
    pub async fn get_chunk_info(&self, file_id: &str) -> AppResult<Option<ChunkInfo>> {
        check_file_id(file_id)?;

        match self.provider.read_bytes(&self.info_path(file_id)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether a working area exists for `file_id`, with or without metadata.
    pub async fn has_session(&self, file_id: &str) -> AppResult<bool> {
        check_file_id(file_id)?;
        self.provider.exists(&self.session_dir(file_id)).await
    }

    /// Chunks `0..total_chunks` as one stream, opened lazily in index order.
    ///
    /// Only one chunk is open at a time. The returned status reports which
    /// chunk broke the stream, if any.
    pub fn chunk_stream(&self, file_id: &str, total_chunks: u32) -> (ByteStream, ChunkReadStatus) {
        let status = ChunkReadStatus::default();
        let provider = Arc::clone(&self.provider);
        let tracker = status.clone();
        let base = self.session_dir(file_id);

        let chunks = stream::iter(0..total_chunks)
            .then(move |index| {
                let provider = Arc::clone(&provider);
                let tracker = tracker.clone();
                let path = format!("{base}/{index}");
                async move {
                    match provider.read(&path).await {
                        Ok(body) => {
                            let on_error = tracker.clone();
                            Ok(body.inspect_err(move |_| on_error.mark(index)))
                        }
                        Err(e) => {
                            tracker.mark(index);
                            Err(std::io::Error::other(e))
                        }
                    }
                }
            })
            .try_flatten();

        (Box::pin(chunks), status)
    }

    /// Remove the whole working area of `file_id`.
    pub async fn purge(&self, file_id: &str) -> AppResult<()> {
        check_file_id(file_id)?;
        self.provider.delete_dir(&self.session_dir(file_id)).await?;
        debug!(file_id, "Purged upload working area");
        Ok(())
    }

    /// Every upload with a working area.
    pub async fn list_sessions(&self) -> AppResult<Vec<UploadSession>> {
        let mut sessions = Vec::new();

        for dir in self.provider.list(&self.chunks_dir).await? {
            if !dir.is_directory {
                continue;
            }
            let Some(file_id) = dir.path.rsplit('/').next().map(str::to_string) else {
                continue;
            };

            let entries = self.provider.list(&dir.path).await?;
            let stored_chunks = entries
                .iter()
                .filter(|e| !e.is_directory)
                .filter(|e| {
                    e.path
                        .rsplit('/')
                        .next()
                        .is_some_and(|name| name.parse::<u32>().is_ok())
                })
                .count();
            let last_modified = entries
                .iter()
                .filter_map(|e| e.last_modified)
                .chain(dir.last_modified)
                .max();

            let info = match self.get_chunk_info(&file_id).await {
                Ok(info) => info,
                Err(e) => {
                    warn!(file_id, error = %e, "Unreadable upload metadata");
                    None
                }
            };

            sessions.push(UploadSession {
                file_id,
                info,
                stored_chunks,
                last_modified,
            });
        }

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LocalStorageProvider;
    use chunkhub_core::error::ErrorKind;

    async fn store() -> (tempfile::TempDir, ChunkStore) {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        let config = StorageConfig::rooted_at(dir.path().to_string_lossy());
        (dir, ChunkStore::new(Arc::new(provider), &config))
    }

    fn info(file_id: &str, index: u32, total: u32) -> ChunkInfo {
        ChunkInfo {
            file_id: file_id.to_string(),
            chunk_index: index,
            total_chunks: total,
            total_size: 6,
            originalname: "a.txt".to_string(),
            mimetype: "text/plain".to_string(),
            md5: None,
        }
    }

    async fn collect(mut stream: ByteStream) -> Result<Vec<u8>, std::io::Error> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_save_and_get_chunk_info() {
        let (_dir, store) = store().await;
        assert!(store.get_chunk_info("abc").await.unwrap().is_none());

        store
            .save_chunk("abc", 1, Bytes::from("BB"), &info("abc", 1, 3))
            .await
            .unwrap();

        let stored = store.get_chunk_info("abc").await.unwrap().unwrap();
        assert_eq!(stored.chunk_index, 1);
        assert_eq!(stored.total_chunks, 3);
        assert!(store.has_session("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_resend_overwrites_payload() {
        let (_dir, store) = store().await;
        store
            .save_chunk("abc", 0, Bytes::from("old"), &info("abc", 0, 1))
            .await
            .unwrap();
        store
            .save_chunk("abc", 0, Bytes::from("new"), &info("abc", 0, 1))
            .await
            .unwrap();

        let (stream, status) = store.chunk_stream("abc", 1);
        assert_eq!(collect(stream).await.unwrap(), b"new");
        assert!(status.first_failed().is_none());
    }

    #[tokio::test]
    async fn test_chunk_stream_orders_by_index() {
        let (_dir, store) = store().await;
        for (index, payload) in [(2, "CC"), (0, "AA"), (1, "BB")] {
            store
                .save_chunk("abc", index, Bytes::from(payload), &info("abc", index, 3))
                .await
                .unwrap();
        }

        let (stream, _) = store.chunk_stream("abc", 3);
        assert_eq!(collect(stream).await.unwrap(), b"AABBCC");
    }

    #[tokio::test]
    async fn test_chunk_stream_reports_missing_chunk() {
        let (_dir, store) = store().await;
        for index in [0, 2] {
            store
                .save_chunk("gap", index, Bytes::from("xx"), &info("gap", index, 3))
                .await
                .unwrap();
        }

        let (stream, status) = store.chunk_stream("gap", 3);
        assert!(collect(stream).await.is_err());
        assert_eq!(status.first_failed(), Some(1));

        let err = status.to_error("gap").unwrap();
        assert_eq!(err.kind, ErrorKind::MergeFailure);
        assert!(err.message.contains("chunk 1"));
    }

    #[tokio::test]
    async fn test_purge_removes_session() {
        let (_dir, store) = store().await;
        store
            .save_chunk("abc", 0, Bytes::from("AA"), &info("abc", 0, 1))
            .await
            .unwrap();

        store.purge("abc").await.unwrap();
        assert!(store.get_chunk_info("abc").await.unwrap().is_none());
        assert!(!store.has_session("abc").await.unwrap());

        // Purging twice is harmless.
        store.purge("abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let (_dir, store) = store().await;
        assert!(store.list_sessions().await.unwrap().is_empty());

        store
            .save_chunk("one", 0, Bytes::from("AA"), &info("one", 0, 3))
            .await
            .unwrap();
        store
            .save_chunk("one", 1, Bytes::from("BB"), &info("one", 1, 3))
            .await
            .unwrap();
        store
            .save_chunk("two", 0, Bytes::from("CC"), &info("two", 0, 2))
            .await
            .unwrap();

        let mut sessions = store.list_sessions().await.unwrap();
        sessions.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].file_id, "one");
        assert_eq!(sessions[0].stored_chunks, 2);
        assert_eq!(sessions[1].info.as_ref().unwrap().total_chunks, 2);
        assert!(sessions[1].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_file_id() {
        let (_dir, store) = store().await;
        let err = store
            .save_chunk("../x", 0, Bytes::from("AA"), &info("../x", 0, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
