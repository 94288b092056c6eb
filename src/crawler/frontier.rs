//! Shared crawl frontier
//!
//! This module owns every piece of state the workers share:
//! - The directory queue and the file queue
//! - The visited set (directories ever enqueued this process)
//! - The completed set (files on disk) and the claimed set (files in progress)
//! - The indexed set (descriptors whose dependencies were read this process)
//! - Deferred dependencies and detected artifacts
//! - One slot per worker, used for the quiescence check
//! - The pool lifecycle (running, draining, stopped)
//!
//! All of it sits behind a single lock so that "both queues empty and every
//! worker idle" is observed atomically. Workers sleep on a `Notify` between
//! polls and are woken by pushes and by leases being returned.

use crate::repo::RepoPath;
use crate::state::{PoolState, WorkerRole, WorkerSlot};
use crate::storage::{Snapshot, SnapshotEntry};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// A queued directory or file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: RepoPath,

    /// Dependency hops from the seed
    pub depth: u32,

    /// Times this item was requeued after a transient failure
    pub attempts: u32,
}

impl WorkItem {
    pub fn new(path: RepoPath, depth: u32) -> Self {
        Self {
            path,
            depth,
            attempts: 0,
        }
    }

    /// The same item with one more attempt recorded
    pub fn retry(&self) -> Self {
        Self {
            path: self.path.clone(),
            depth: self.depth,
            attempts: self.attempts + 1,
        }
    }
}

/// Result of trying to claim a file for download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the download
    Acquired,

    /// Already completed, in this or an earlier run
    Completed,

    /// Another worker claimed it this run
    InProgress,
}

#[derive(Debug)]
struct Worker {
    role: WorkerRole,
    slot: WorkerSlot,
    item: Option<WorkItem>,
}

#[derive(Debug, Default)]
struct Inner {
    state: PoolState,
    stop_requested: bool,
    directories: VecDeque<WorkItem>,
    files: VecDeque<WorkItem>,
    visited: HashSet<RepoPath>,
    completed: HashSet<RepoPath>,
    claimed: HashSet<RepoPath>,
    indexed: HashSet<RepoPath>,
    deferred: BTreeSet<RepoPath>,
    artifacts: HashSet<String>,
    workers: Vec<Worker>,
}

impl Inner {
    fn all_idle(&self) -> bool {
        self.workers.iter().all(|w| w.slot.is_idle())
    }

    fn is_quiescent(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty() && self.all_idle()
    }

    fn transition(&mut self, to: PoolState) {
        if self.state.can_transition_to(to) && self.state != to {
            tracing::debug!("Pool {} -> {}", self.state, to);
            self.state = to;
        }
    }

    fn queue(&mut self, role: WorkerRole) -> &mut VecDeque<WorkItem> {
        match role {
            WorkerRole::Listing => &mut self.directories,
            WorkerRole::Fetch => &mut self.files,
        }
    }
}

/// The frontier shared by all workers
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    poll_interval: Duration,
}

/// A popped item, owned by one worker slot
///
/// The slot counts as busy until the lease is dropped, so an empty queue
/// does not end the crawl while this item may still produce more work.
#[derive(Debug)]
pub struct Lease<'a> {
    frontier: &'a Frontier,
    slot: usize,
    item: WorkItem,
}

impl Lease<'_> {
    pub fn item(&self) -> &WorkItem {
        &self.item
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.frontier.release_slot(self.slot);
    }
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `poll_interval` - Upper bound on how long an idle worker sleeps
    ///   before re-checking the queues
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            poll_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a worker slot and returns its index
    ///
    /// Every worker must be registered before any of them polls, otherwise
    /// an early poll could see quiescence too soon.
    pub fn register_worker(&self, role: WorkerRole) -> usize {
        let mut inner = self.lock();
        inner.workers.push(Worker {
            role,
            slot: WorkerSlot::Idle,
            item: None,
        });
        inner.workers.len() - 1
    }

    // ===== Queues =====

    /// Enqueues a directory unless it was enqueued before
    ///
    /// Returns true if the directory is new.
    pub fn push_directory(&self, item: WorkItem) -> bool {
        {
            let mut inner = self.lock();
            if !inner.visited.insert(item.path.clone()) {
                return false;
            }
            inner.directories.push_back(item);
        }
        self.notify.notify_waiters();
        true
    }

    /// Puts a directory back after a transient failure
    pub fn requeue_directory(&self, item: WorkItem) {
        self.lock().directories.push_back(item);
        self.notify.notify_waiters();
    }

    /// Enqueues a file unless it is already completed
    ///
    /// Duplicates of pending files are allowed; the claim step filters them.
    pub fn push_file(&self, item: WorkItem) -> bool {
        {
            let mut inner = self.lock();
            if inner.completed.contains(&item.path) {
                return false;
            }
            inner.files.push_back(item);
        }
        self.notify.notify_waiters();
        true
    }

    /// Enqueues a completed descriptor so its dependencies are read from disk
    ///
    /// Returns false if the descriptor was already indexed this process.
    pub fn push_reindex(&self, item: WorkItem) -> bool {
        {
            let mut inner = self.lock();
            if inner.indexed.contains(&item.path) {
                return false;
            }
            inner.files.push_back(item);
        }
        self.notify.notify_waiters();
        true
    }

    /// Releases the claim on a file and puts it back in the queue
    pub fn requeue_file(&self, item: WorkItem) {
        {
            let mut inner = self.lock();
            inner.claimed.remove(&item.path);
            inner.files.push_back(item);
        }
        self.notify.notify_waiters();
    }

    /// Waits for the next directory to list
    ///
    /// Returns `None` once the pool is stopped or draining.
    pub async fn next_directory(&self, slot: usize) -> Option<Lease<'_>> {
        self.next(slot, WorkerRole::Listing).await
    }

    /// Waits for the next file to fetch
    ///
    /// Returns `None` once the pool is stopped or draining.
    pub async fn next_file(&self, slot: usize) -> Option<Lease<'_>> {
        self.next(slot, WorkerRole::Fetch).await
    }

    async fn next(&self, slot: usize, role: WorkerRole) -> Option<Lease<'_>> {
        loop {
            // Registered before checking so a wakeup between the check and
            // the wait is not lost
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if !inner.state.accepts_work() {
                    // Draining ends once the last in-flight item is released
                    if !inner.state.is_terminal() && inner.all_idle() {
                        inner.transition(PoolState::Stopped);
                        drop(inner);
                        self.notify.notify_waiters();
                    }
                    return None;
                }

                if let Some(item) = inner.queue(role).pop_front() {
                    if let Some(worker) = inner.workers.get_mut(slot) {
                        worker.slot = WorkerSlot::Processing(item.path.clone());
                        worker.item = Some(item.clone());
                    }
                    return Some(Lease {
                        frontier: self,
                        slot,
                        item,
                    });
                }

                if inner.is_quiescent() {
                    tracing::debug!("Frontier quiescent, stopping workers");
                    inner.transition(PoolState::Stopped);
                    drop(inner);
                    self.notify.notify_waiters();
                    return None;
                }
            }

            let _ = tokio::time::timeout(self.poll_interval, notified).await;
        }
    }

    fn release_slot(&self, slot: usize) {
        {
            let mut inner = self.lock();
            if let Some(worker) = inner.workers.get_mut(slot) {
                worker.slot = WorkerSlot::Idle;
                worker.item = None;
            }
        }
        self.notify.notify_waiters();
    }

    // ===== Files =====

    /// Atomically claims a file for download
    pub fn claim_file(&self, path: &RepoPath) -> Claim {
        let mut inner = self.lock();
        if inner.completed.contains(path) {
            Claim::Completed
        } else if !inner.claimed.insert(path.clone()) {
            Claim::InProgress
        } else {
            Claim::Acquired
        }
    }

    /// Gives up a claim without completing the file
    pub fn release_claim(&self, path: &RepoPath) {
        self.lock().claimed.remove(path);
    }

    /// Marks a file as on disk
    ///
    /// Returns true if it was not completed before.
    pub fn complete_file(&self, path: &RepoPath) -> bool {
        let mut inner = self.lock();
        inner.claimed.remove(path);
        inner.completed.insert(path.clone())
    }

    /// Seeds the completed set from an earlier run
    pub fn preload_completed(&self, paths: impl IntoIterator<Item = RepoPath>) {
        self.lock().completed.extend(paths);
    }

    pub fn is_completed(&self, path: &RepoPath) -> bool {
        self.lock().completed.contains(path)
    }

    /// Completed files in sorted order
    pub fn completed_paths(&self) -> Vec<RepoPath> {
        let mut paths: Vec<_> = self.lock().completed.iter().cloned().collect();
        paths.sort();
        paths
    }

    // ===== Dependencies =====

    /// Marks a descriptor as indexed
    ///
    /// Returns true the first time, when its dependencies should be expanded.
    pub fn mark_indexed(&self, path: &RepoPath) -> bool {
        self.lock().indexed.insert(path.clone())
    }

    /// Records a dependency skipped by the depth cap
    pub fn record_deferred(&self, path: RepoPath) -> bool {
        self.lock().deferred.insert(path)
    }

    pub fn deferred(&self) -> Vec<RepoPath> {
        self.lock().deferred.iter().cloned().collect()
    }

    /// Records an artifact by its `group:artifact` key
    pub fn record_artifact(&self, key: String) -> bool {
        self.lock().artifacts.insert(key)
    }

    pub fn artifact_count(&self) -> usize {
        self.lock().artifacts.len()
    }

    // ===== Lifecycle =====

    /// Stops handing out items; in-flight items still finish
    pub fn request_stop(&self) {
        {
            let mut inner = self.lock();
            if inner.stop_requested {
                return;
            }
            inner.stop_requested = true;
            inner.transition(PoolState::Draining);
        }
        tracing::info!("Stop requested, draining workers");
        self.notify.notify_waiters();
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    pub fn state(&self) -> PoolState {
        self.lock().state
    }

    /// Queued plus in-flight items
    pub fn pending(&self) -> usize {
        let inner = self.lock();
        let in_flight = inner.workers.iter().filter(|w| w.item.is_some()).count();
        inner.directories.len() + inner.files.len() + in_flight
    }

    /// Lengths of the directory and file queues
    pub fn queue_lengths(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.directories.len(), inner.files.len())
    }

    // ===== Persistence =====

    /// Captures pending work, in-flight items first
    ///
    /// In-flight items are included so that a crash after a checkpoint does
    /// not lose them. `config_hash` and `saved_at` are left for the caller.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();

        Snapshot {
            config_hash: None,
            saved_at: None,
            directories: entries(&inner, WorkerRole::Listing),
            files: entries(&inner, WorkerRole::Fetch),
            deferred: inner.deferred.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Loads pending work from a snapshot
    ///
    /// Entries that no longer parse are skipped. Directories go through the
    /// visited set and files through the completed set, so restoring twice
    /// adds nothing new. Completed files for which `reindex` returns true are
    /// queued again so their dependencies are read from disk.
    ///
    /// # Returns
    ///
    /// The number of directories and files enqueued
    pub fn restore(
        &self,
        snapshot: &Snapshot,
        reindex: impl Fn(&RepoPath) -> bool,
    ) -> (usize, usize) {
        let mut directories = 0;
        let mut files = 0;

        for entry in &snapshot.directories {
            match entry.to_task() {
                Some((path, depth)) if path.is_directory() => {
                    if self.push_directory(WorkItem::new(path, depth)) {
                        directories += 1;
                    }
                }
                _ => tracing::warn!("Skipping invalid snapshot directory {:?}", entry),
            }
        }

        for entry in &snapshot.files {
            match entry.to_task() {
                Some((path, depth)) if !path.is_directory() => {
                    let item = WorkItem::new(path, depth);
                    let pushed = if self.is_completed(&item.path) {
                        reindex(&item.path) && self.push_reindex(item)
                    } else {
                        self.push_file(item)
                    };
                    if pushed {
                        files += 1;
                    }
                }
                _ => tracing::warn!("Skipping invalid snapshot file {:?}", entry),
            }
        }

        {
            let mut inner = self.lock();
            for raw in &snapshot.deferred {
                if let Ok(path) = RepoPath::directory(raw) {
                    inner.deferred.insert(path);
                }
            }
        }

        (directories, files)
    }
}

/// In-flight items of one role followed by that role's queue
fn entries(inner: &Inner, role: WorkerRole) -> Vec<SnapshotEntry> {
    let queued = match role {
        WorkerRole::Listing => &inner.directories,
        WorkerRole::Fetch => &inner.files,
    };

    inner
        .workers
        .iter()
        .filter(|w| w.role == role)
        .filter_map(|w| w.item.as_ref())
        .chain(queued.iter())
        .map(|item| SnapshotEntry::new(&item.path, item.depth))
        .collect()
}
