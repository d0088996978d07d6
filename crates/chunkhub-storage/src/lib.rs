//! # chunkhub-storage
//!
//! Storage layer for ChunkHub: the local filesystem provider, the chunk
//! store and its per-upload lock table, the merge engine, and the
//! persisted file catalog.

pub mod catalog;
pub mod chunked;
pub mod providers;

pub use catalog::JsonFileCatalog;
pub use chunked::{ChunkStore, MergeEngine, UploadLocks};
pub use providers::LocalStorageProvider;
