//! File-based state store
//!
//! This module keeps the pending-work snapshot as pretty-printed JSON and the
//! completion log as one path per line, both under a hidden directory of the
//! output root.

use crate::repo::RepoPath;
use crate::storage::traits::{StateStore, StorageError, StorageResult};
use crate::storage::Snapshot;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const SNAPSHOT_FILE: &str = "pending.json";
const COMPLETED_LOG: &str = "completed.log";

/// JSON snapshot + append-only log backend
pub struct JsonStateStore {
    dir: PathBuf,
    log: Mutex<Option<File>>,
}

impl JsonStateStore {
    /// Creates a store rooted at `dir`
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            log: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn completed_log_path(&self) -> PathBuf {
        self.dir.join(COMPLETED_LOG)
    }
}

impl StateStore for JsonStateStore {
    fn load_snapshot(&self) -> StorageResult<Option<Snapshot>> {
        let path = self.snapshot_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Some(Snapshot::default()));
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::CorruptSnapshot {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.snapshot_path();
        let tmp = self.dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &path)?;
        tracing::debug!(
            "Saved snapshot {} ({} directories, {} files)",
            path.display(),
            snapshot.directories.len(),
            snapshot.files.len()
        );
        Ok(())
    }

    fn load_completed(&self) -> StorageResult<HashSet<RepoPath>> {
        let path = self.completed_log_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut completed = HashSet::new();
        let mut skipped = 0usize;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match RepoPath::parse(line) {
                Ok(path) if !path.is_directory() => {
                    completed.insert(path);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!("Ignored {} malformed lines in {}", skipped, path.display());
        }

        Ok(completed)
    }

    fn append_completed(&self, path: &RepoPath) -> StorageResult<()> {
        let mut guard = self.log.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.is_none() {
            fs::create_dir_all(&self.dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.completed_log_path())?;
            *guard = Some(file);
        }

        if let Some(file) = guard.as_mut() {
            writeln!(file, "{}", path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SnapshotEntry;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonStateStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStateStore::new(dir.path().join(".mvn-mirror"));
        (dir, store)
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let (_dir, store) = store();
        assert!(store.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let (_dir, store) = store();
        let snapshot = Snapshot {
            config_hash: Some("abc".to_string()),
            saved_at: Some(chrono::Utc::now()),
            directories: vec![SnapshotEntry::new(&RepoPath::parse("a/").unwrap(), 1)],
            files: vec![SnapshotEntry::new(&RepoPath::parse("a/x.jar").unwrap(), 1)],
            deferred: vec!["g/".to_string()],
        };

        store.save_snapshot(&snapshot).unwrap();
        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!store.dir().join("pending.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_snapshot_reported() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.snapshot_path(), "{not json").unwrap();
        assert!(matches!(
            store.load_snapshot(),
            Err(StorageError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn test_completed_log_is_replay_safe() {
        let (_dir, store) = store();
        let a = RepoPath::parse("g/a.jar").unwrap();
        let b = RepoPath::parse("g/b.pom").unwrap();

        store.append_completed(&a).unwrap();
        store.append_completed(&b).unwrap();
        store.append_completed(&a).unwrap();

        let completed = store.load_completed().unwrap();
        assert_eq!(completed.len(), 2);
        assert!(completed.contains(&a));
        assert!(completed.contains(&b));
    }

    #[test]
    fn test_completed_log_ignores_garbage() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.completed_log_path(), "g/a.jar\n\n../bad\ng/dir/\n").unwrap();

        let completed = store.load_completed().unwrap();
        assert_eq!(completed.len(), 1);
    }
}
