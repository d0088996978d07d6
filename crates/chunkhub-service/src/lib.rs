//! # chunkhub-service
//!
//! Service layer for ChunkHub. Services validate incoming requests and
//! orchestrate the chunk store, merge engine, storage provider, and file
//! catalog.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod file;

pub use file::{ByteRange, Download, DownloadService, SimpleUpload, UploadService};
