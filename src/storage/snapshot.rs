//! Serialized form of the pending work queues

use crate::repo::RepoPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One pending queue item as written to disk
///
/// Older snapshots stored bare path strings; those still load, with depth 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotEntry {
    Task {
        path: String,
        #[serde(default)]
        depth: u32,
    },
    Bare(String),
}

impl SnapshotEntry {
    pub fn new(path: &RepoPath, depth: u32) -> Self {
        Self::Task {
            path: path.to_string(),
            depth,
        }
    }

    /// Validates the stored path
    ///
    /// Returns `None` for entries that no longer parse as repository paths.
    pub fn to_task(&self) -> Option<(RepoPath, u32)> {
        let (raw, depth) = match self {
            Self::Task { path, depth } => (path.as_str(), *depth),
            Self::Bare(path) => (path.as_str(), 0),
        };
        RepoPath::parse(raw).ok().map(|path| (path, depth))
    }
}

/// Snapshot of both frontier queues at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Hash of the configuration the snapshot was taken under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,

    /// Directories waiting to be listed
    #[serde(default, alias = "parse_queue")]
    pub directories: Vec<SnapshotEntry>,

    /// Files waiting to be fetched
    #[serde(default, alias = "download_queue")]
    pub files: Vec<SnapshotEntry>,

    /// Dependencies found past the depth cap, kept for a later run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<String>,
}

impl Snapshot {
    /// Returns true if there is no pending work to resume
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}
