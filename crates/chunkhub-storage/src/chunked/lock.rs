//! Per-upload reader/writer locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

type LockTable = DashMap<String, Arc<RwLock<()>>>;

/// Lock table keyed by `fileId`.
///
/// Chunk writes hold the shared side so they proceed concurrently; the
/// first chunk of an upload, merges, and discards hold the exclusive side. Entries are dropped once the last
/// guard for a `fileId` is released.
#[derive(Debug, Clone, Default)]
pub struct UploadLocks {
    table: Arc<LockTable>,
}

enum HeldLock {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// A held lock on one upload. Releases on drop.
pub struct UploadLockGuard {
    file_id: String,
    table: Arc<LockTable>,
    held: Option<HeldLock>,
}

impl UploadLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the shared side for `file_id`.
    pub async fn shared(&self, file_id: &str) -> UploadLockGuard {
        let guard = self.lock_for(file_id).read_owned().await;
        self.guard(file_id, HeldLock::Shared(guard))
    }

    /// Acquire the exclusive side for `file_id`.
    pub async fn exclusive(&self, file_id: &str) -> UploadLockGuard {
        let guard = self.lock_for(file_id).write_owned().await;
        self.guard(file_id, HeldLock::Exclusive(guard))
    }

    /// Number of uploads with a live lock entry.
    pub fn active(&self) -> usize {
        self.table.len()
    }

    fn lock_for(&self, file_id: &str) -> Arc<RwLock<()>> {
        self.table
            .entry(file_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    fn guard(&self, file_id: &str, held: HeldLock) -> UploadLockGuard {
        UploadLockGuard {
            file_id: file_id.to_string(),
            table: Arc::clone(&self.table),
            held: Some(held),
        }
    }
}

impl UploadLockGuard {
    /// The upload this guard protects.
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Whether this guard holds the exclusive side.
    pub fn is_exclusive(&self) -> bool {
        matches!(self.held, Some(HeldLock::Exclusive(_)))
    }
}

impl std::fmt::Debug for UploadLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadLockGuard")
            .field("file_id", &self.file_id)
            .field("exclusive", &self.is_exclusive())
            .finish()
    }
}

impl Drop for UploadLockGuard {
    fn drop(&mut self) {
        // Release first so our own Arc no longer counts.
        self.held.take();
        self.table
            .remove_if(&self.file_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
