//! Metadata catalog trait for finalized file records.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::record::FileRecord;

/// Append-only record list of finished uploads, keyed by generated filename.
///
/// Implementations may be backed by any store; lookups are by exact
/// `filename` match.
#[async_trait]
pub trait FileCatalog: Send + Sync + std::fmt::Debug + 'static {
    /// Record a finished file and return it.
    async fn append(&self, record: FileRecord) -> AppResult<FileRecord>;

    /// Find a record by its generated filename.
    async fn find_by_name(&self, filename: &str) -> AppResult<Option<FileRecord>>;

    /// Remove a record. Returns `true` if a record was removed.
    async fn remove(&self, filename: &str) -> AppResult<bool>;

    /// All records in insertion order.
    async fn list(&self) -> AppResult<Vec<FileRecord>>;
}
