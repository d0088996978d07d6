//! File download service: streams finished files, whole or by byte range.

use std::sync::Arc;

use tracing::debug;

use chunkhub_core::error::AppError;
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::catalog::FileCatalog;
use chunkhub_core::traits::storage::{ByteStream, StorageProvider};
use chunkhub_core::types::record::FileRecord;

/// A requested byte range. `end` is inclusive; `None` means "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Resolve against a file of `total` bytes into inclusive offsets.
    pub fn resolve(self, total: u64) -> AppResult<(u64, u64)> {
        let last = total.checked_sub(1);
        let end = self.end.or(last);

        match (end, last) {
            (Some(end), Some(last)) if self.start <= end && self.start <= last && end <= last => {
                Ok((self.start, end))
            }
            _ => Err(AppError::range_not_satisfiable(format!(
                "Range {}-{} is outside a file of {total} bytes",
                self.start,
                self.end.map(|e| e.to_string()).unwrap_or_default()
            ))),
        }
    }
}

/// An opened download.
pub struct Download {
    /// Record of the file being sent.
    pub record: FileRecord,
    /// File content.
    pub stream: ByteStream,
    /// Inclusive offsets served, for ranged downloads.
    pub range: Option<(u64, u64)>,
    /// Size of the stored file.
    pub total: u64,
}

impl Download {
    /// Number of bytes the stream yields.
    pub fn content_length(&self) -> u64 {
        match self.range {
            Some((start, end)) => end - start + 1,
            None => self.total,
        }
    }
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.record.filename)
            .field("range", &self.range)
            .field("total", &self.total)
            .finish()
    }
}

/// Handles file downloads with optional byte ranges.
#[derive(Debug, Clone)]
pub struct DownloadService {
    /// Storage provider holding artifacts.
    provider: Arc<dyn StorageProvider>,
    /// Catalog of finished files.
    catalog: Arc<dyn FileCatalog>,
}

impl DownloadService {
    /// Creates a new download service.
    pub fn new(provider: Arc<dyn StorageProvider>, catalog: Arc<dyn FileCatalog>) -> Self {
        Self { provider, catalog }
    }

    /// Opens a finished file for streaming.
    pub async fn open(&self, filename: &str, range: Option<ByteRange>) -> AppResult<Download> {
        let record = self
            .catalog
            .find_by_name(filename)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File '{filename}' not found")))?;

        let total = self.provider.metadata(&record.path).await?.size_bytes;

        let (stream, range) = match range {
            Some(requested) => {
                let (start, end) = requested.resolve(total)?;
                let stream = self.provider.read_range(&record.path, start, end).await?;
                (stream, Some((start, end)))
            }
            None => (self.provider.read(&record.path).await?, None),
        };

        debug!(filename, total, ?range, "Opened download");

        Ok(Download {
            record,
            stream,
            range,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chunkhub_core::config::storage::StorageConfig;
    use chunkhub_core::error::ErrorKind;
    use chunkhub_storage::{JsonFileCatalog, LocalStorageProvider};
    use futures::StreamExt;

    use crate::file::upload::{SimpleUpload, UploadService};

    async fn services() -> (tempfile::TempDir, UploadService, DownloadService) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig::rooted_at(dir.path().to_string_lossy());
        let provider: Arc<dyn StorageProvider> =
            Arc::new(LocalStorageProvider::new(dir.path()).await.unwrap());
        let catalog: Arc<dyn FileCatalog> =
            Arc::new(JsonFileCatalog::open(config.catalog_path()).await.unwrap());
        let uploads = UploadService::new(provider.clone(), catalog.clone(), config);
        (dir, uploads, DownloadService::new(provider, catalog))
    }

    async fn stored(uploads: &UploadService, body: &'static str) -> FileRecord {
        uploads
            .simple_upload(SimpleUpload {
                originalname: "data.bin".to_string(),
                mimetype: None,
                data: Bytes::from(body),
            })
            .await
            .unwrap()
    }

    async fn body(download: Download) -> Vec<u8> {
        let mut stream = download.stream;
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[test]
    fn test_resolve_range() {
        let closed = ByteRange {
            start: 2,
            end: Some(3),
        };
        assert_eq!(closed.resolve(6).unwrap(), (2, 3));

        let open = ByteRange {
            start: 4,
            end: None,
        };
        assert_eq!(open.resolve(6).unwrap(), (4, 5));

        for bad in [
            ByteRange {
                start: 6,
                end: None,
            },
            ByteRange {
                start: 0,
                end: Some(6),
            },
            ByteRange {
                start: 3,
                end: Some(2),
            },
        ] {
            let err = bad.resolve(6).unwrap_err();
            assert_eq!(err.kind, ErrorKind::RangeNotSatisfiable);
        }

        assert!(open.resolve(0).is_err());
    }

    #[tokio::test]
    async fn test_full_download() {
        let (_dir, uploads, downloads) = services().await;
        let record = stored(&uploads, "AABBCC").await;

        let download = downloads.open(&record.filename, None).await.unwrap();
        assert_eq!(download.content_length(), 6);
        assert!(download.range.is_none());
        assert_eq!(body(download).await, b"AABBCC");
    }

    #[tokio::test]
    async fn test_ranged_download() {
        let (_dir, uploads, downloads) = services().await;
        let record = stored(&uploads, "AABBCC").await;

        let download = downloads
            .open(
                &record.filename,
                Some(ByteRange {
                    start: 2,
                    end: Some(3),
                }),
            )
            .await
            .unwrap();
        assert_eq!(download.range, Some((2, 3)));
        assert_eq!(download.content_length(), 2);
        assert_eq!(body(download).await, b"BB");

        let err = downloads
            .open(
                &record.filename,
                Some(ByteRange {
                    start: 10,
                    end: None,
                }),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RangeNotSatisfiable);
    }

    #[tokio::test]
    async fn test_unknown_file_is_not_found() {
        let (_dir, _uploads, downloads) = services().await;
        let err = downloads.open("missing", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
