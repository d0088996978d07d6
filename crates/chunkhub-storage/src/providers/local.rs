//! Local filesystem storage provider.

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use chunkhub_core::error::{AppError, ErrorKind};
use chunkhub_core::result::AppResult;
use chunkhub_core::traits::storage::{ByteStream, StorageObjectMeta, StorageProvider};

/// Local filesystem storage provider.
#[derive(Debug, Clone)]
pub struct LocalStorageProvider {
    /// Root directory for all stored objects.
    root: PathBuf,
}

impl LocalStorageProvider {
    /// Create a new local storage provider rooted at the given path.
    pub async fn new(root_path: impl AsRef<Path>) -> AppResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve a relative path to a path within the root.
    ///
    /// Parent-directory components are rejected so no path escapes the root.
    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let clean = Path::new(path.trim_start_matches('/'));
        if clean
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(AppError::validation(format!("Invalid storage path: {path}")));
        }
        Ok(self.root.join(clean))
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    async fn open(&self, path: &str) -> AppResult<fs::File> {
        let full_path = self.resolve(path)?;
        fs::File::open(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("File not found: {path}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to open file: {path}"),
                    e,
                )
            }
        })
    }
}

/// A unique temporary path next to `path`.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn read(&self, path: &str) -> AppResult<ByteStream> {
        let file = self.open(path).await?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn read_range(&self, path: &str, start: u64, end: u64) -> AppResult<ByteStream> {
        if start > end {
            return Err(AppError::range_not_satisfiable(format!(
                "Invalid range {start}-{end} for {path}"
            )));
        }

        let mut file = self.open(path).await?;
        file.seek(SeekFrom::Start(start)).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to seek in {path}"), e)
        })?;

        let limited = file.take(end - start + 1);
        Ok(Box::pin(ReaderStream::new(limited)))
    }

    async fn read_bytes(&self, path: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(path)?;
        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("File not found: {path}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read file: {path}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, path: &str, data: Bytes) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        self.ensure_parent(&full_path).await?;

        // Readers see either the old content or the new, never a partial file.
        let temp_path = temp_sibling(&full_path);
        let written = match fs::write(&temp_path, &data).await {
            Ok(()) => fs::rename(&temp_path, &full_path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write file: {path}"),
                e,
            ));
        }

        debug!(path, bytes = data.len(), "Wrote file");
        Ok(())
    }

    async fn write_stream(&self, path: &str, mut stream: ByteStream) -> AppResult<u64> {
        let full_path = self.resolve(path)?;
        self.ensure_parent(&full_path).await?;

        let mut file = fs::File::create(&full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create file: {path}"),
                e,
            )
        })?;

        let mut total_bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e)
            })?;
        }

        file.flush()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush file", e))?;

        debug!(path, bytes = total_bytes, "Wrote file from stream");
        Ok(total_bytes)
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete file: {path}"),
                e,
            )),
        }
    }

    async fn delete_dir(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        match fs::remove_dir_all(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete directory: {path}"),
                e,
            )),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> AppResult<()> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        self.ensure_parent(&to_path).await?;

        fs::rename(&from_path, &to_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to rename {from} -> {to}"),
                e,
            )
        })?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        let full_path = self.resolve(path)?;
        Ok(fs::try_exists(&full_path).await.unwrap_or(false))
    }

    async fn metadata(&self, path: &str) -> AppResult<StorageObjectMeta> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Path not found: {path}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to get metadata: {path}"),
                    e,
                )
            }
        })?;

        Ok(StorageObjectMeta {
            path: path.to_string(),
            size_bytes: meta.len(),
            last_modified: meta.modified().ok().map(chrono::DateTime::<chrono::Utc>::from),
            is_directory: meta.is_dir(),
        })
    }

    async fn list(&self, path: &str) -> AppResult<Vec<StorageObjectMeta>> {
        let full_path = self.resolve(path)?;
        let mut dir = match fs::read_dir(&full_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to list directory: {path}"),
                    e,
                ));
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read directory entry", e)
        })? {
            let entry_meta = entry.metadata().await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to get entry metadata", e)
            })?;

            let name = entry.file_name().to_string_lossy().to_string();
            let entry_path = if path.is_empty() || path == "/" {
                name
            } else {
                format!("{}/{}", path.trim_end_matches('/'), name)
            };

            entries.push(StorageObjectMeta {
                path: entry_path,
                size_bytes: entry_meta.len(),
                last_modified: entry_meta
                    .modified()
                    .ok()
                    .map(chrono::DateTime::<chrono::Utc>::from),
                is_directory: entry_meta.is_dir(),
            });
        }

        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then(a.path.cmp(&b.path))
        });

        Ok(entries)
    }

    async fn create_dir(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        fs::create_dir_all(&full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create directory: {path}"),
                e,
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn provider() -> (tempfile::TempDir, LocalStorageProvider) {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        (dir, provider)
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let (_dir, provider) = provider().await;

        let data = Bytes::from("hello world");
        provider.write("test/file.txt", data.clone()).await.unwrap();
        assert!(provider.exists("test/file.txt").await.unwrap());

        let read_back = provider.read_bytes("test/file.txt").await.unwrap();
        assert_eq!(read_back, data);

        provider.delete("test/file.txt").await.unwrap();
        assert!(!provider.exists("test/file.txt").await.unwrap());

        // Deleting again is not an error.
        provider.delete("test/file.txt").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overwrite_is_never_observed_partially() {
        let (_dir, provider) = provider().await;
        let payloads: Vec<Bytes> = (b'a'..=b'h')
            .map(|c| Bytes::from(vec![c; 64 * 1024]))
            .collect();
        provider.write("meta/info.json", payloads[0].clone()).await.unwrap();

        let mut tasks = Vec::new();
        for payload in payloads.iter().cloned() {
            let writer = provider.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..8 {
                    writer.write("meta/info.json", payload.clone()).await.unwrap();
                }
            }));
            let reader = provider.clone();
            let expected = payloads.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..32 {
                    let seen = reader.read_bytes("meta/info.json").await.unwrap();
                    assert!(expected.contains(&seen), "read a partial write");
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let entries = provider.list("meta").await.unwrap();
        assert_eq!(entries.len(), 1, "temporary files left behind: {entries:?}");
        assert_eq!(entries[0].path, "meta/info.json");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_dir, provider) = provider().await;
        let err = provider.read("nope/0").await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_read_range() {
        let (_dir, provider) = provider().await;
        provider
            .write("r.bin", Bytes::from("AABBCC"))
            .await
            .unwrap();

        let middle = collect(provider.read_range("r.bin", 2, 3).await.unwrap()).await;
        assert_eq!(middle, b"BB");

        let tail = collect(provider.read_range("r.bin", 4, 5).await.unwrap()).await;
        assert_eq!(tail, b"CC");

        let err = provider.read_range("r.bin", 3, 2).await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::RangeNotSatisfiable);
    }

    #[tokio::test]
    async fn test_write_stream() {
        let (_dir, provider) = provider().await;
        let parts: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from("ab")), Ok(Bytes::from("cd"))];
        let written = provider
            .write_stream("s/out", Box::pin(futures::stream::iter(parts)))
            .await
            .unwrap();
        assert_eq!(written, 4);
        assert_eq!(provider.read_bytes("s/out").await.unwrap(), "abcd");
    }

    #[tokio::test]
    async fn test_list_and_delete_dir() {
        let (_dir, provider) = provider().await;

        provider.write("listdir/a.txt", Bytes::from("a")).await.unwrap();
        provider.write("listdir/b.txt", Bytes::from("b")).await.unwrap();
        provider.create_dir("listdir/subdir").await.unwrap();

        let entries = provider.list("listdir").await.unwrap();
        assert_eq!(entries.len(), 3);
        // Directories come first
        assert!(entries[0].is_directory);

        provider.delete_dir("listdir").await.unwrap();
        assert!(provider.list("listdir").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename() {
        let (_dir, provider) = provider().await;
        provider.write("orig.txt", Bytes::from("content")).await.unwrap();

        provider.rename("orig.txt", "moved/there.txt").await.unwrap();
        assert!(!provider.exists("orig.txt").await.unwrap());
        assert_eq!(
            provider.read_bytes("moved/there.txt").await.unwrap(),
            "content"
        );
    }

    #[tokio::test]
    async fn test_rejects_parent_components() {
        let (_dir, provider) = provider().await;
        let err = provider
            .write("../escape.txt", Bytes::from("x"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
