//! Core traits defined in `chunkhub-core` and implemented by other crates.

pub mod catalog;
pub mod storage;

pub use catalog::FileCatalog;
pub use storage::StorageProvider;
