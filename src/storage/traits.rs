//! Storage traits and error types
//!
//! This module defines the trait interface for crawl-state backends and
//! associated error types.

use crate::repo::RepoPath;
use crate::storage::Snapshot;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt snapshot {path}: {message}")]
    CorruptSnapshot { path: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl-state persistence backends
///
/// Implementations must be safe to call from many workers at once. Calls may
/// block; async callers run them on the blocking pool. Failures are reported
/// but callers treat them as best-effort: the crawl keeps going in memory.
pub trait StateStore: Send + Sync {
    // ===== Pending Work =====

    /// Loads the last saved snapshot
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No snapshot has been written yet
    /// * `Ok(Some(snapshot))` - The stored snapshot, possibly empty
    fn load_snapshot(&self) -> StorageResult<Option<Snapshot>>;

    /// Replaces the stored snapshot
    ///
    /// A crash during this call must leave either the old or the new
    /// snapshot readable.
    fn save_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()>;

    // ===== Completion Log =====

    /// Replays the completion log
    ///
    /// Duplicate and malformed lines are tolerated.
    fn load_completed(&self) -> StorageResult<HashSet<RepoPath>>;

    /// Appends one completed file path to the log
    fn append_completed(&self, path: &RepoPath) -> StorageResult<()>;
}
