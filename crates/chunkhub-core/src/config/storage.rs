//! Upload storage configuration.

use serde::{Deserialize, Serialize};

/// Storage layout and upload limits.
///
/// All directory names are relative to `data_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for chunks, staged merges, artifacts, and the catalog.
    #[serde(default = "default_data_root")]
    pub data_root: String,
    /// Directory holding one working area per upload session.
    #[serde(default = "default_chunks_dir")]
    pub chunks_dir: String,
    /// Directory holding published artifacts.
    #[serde(default = "default_files_dir")]
    pub files_dir: String,
    /// Directory holding in-progress merge output.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    /// File name of the persisted catalog.
    #[serde(default = "default_catalog_file")]
    pub catalog_file: String,
    /// Maximum size of a reassembled file (default 5 GB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
    /// Maximum size of a single chunk payload (default 64 MB).
    #[serde(default = "default_max_chunk")]
    pub max_chunk_size_bytes: u64,
    /// Maximum number of files accepted by one multi-file upload request.
    #[serde(default = "default_max_files")]
    pub max_files_per_request: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            chunks_dir: default_chunks_dir(),
            files_dir: default_files_dir(),
            staging_dir: default_staging_dir(),
            catalog_file: default_catalog_file(),
            max_upload_size_bytes: default_max_upload(),
            max_chunk_size_bytes: default_max_chunk(),
            max_files_per_request: default_max_files(),
        }
    }
}

impl StorageConfig {
    /// A configuration rooted at `data_root` with every other field defaulted.
    pub fn rooted_at(data_root: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Absolute-or-relative filesystem path of the catalog file.
    pub fn catalog_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_root).join(&self.catalog_file)
    }
}

fn default_data_root() -> String {
    "./uploads".to_string()
}

fn default_chunks_dir() -> String {
    "chunks".to_string()
}

fn default_files_dir() -> String {
    "files".to_string()
}

fn default_staging_dir() -> String {
    "staging".to_string()
}

fn default_catalog_file() -> String {
    "file-info.json".to_string()
}

fn default_max_upload() -> u64 {
    5_368_709_120 // 5 GB
}

fn default_max_chunk() -> u64 {
    67_108_864 // 64 MB
}

fn default_max_files() -> usize {
    10
}
