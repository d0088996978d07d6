//! Chunked upload handling.

pub mod lock;
pub mod merge;
pub mod store;

pub use lock::{UploadLockGuard, UploadLocks};
pub use merge::MergeEngine;
pub use store::{ChunkReadStatus, ChunkStore};
