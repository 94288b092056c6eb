//! Mirror coordinator - main orchestration logic
//!
//! This module wires the pieces together and runs the worker pool:
//! - Restoring pending work and the completed set from the state directory
//! - Seeding the frontier when there is nothing to resume
//! - Spawning listing and fetch workers
//! - Expanding listings and descriptors into new work
//! - Periodic checkpoints and the final snapshot

use crate::config::Config;
use crate::crawler::descriptor::parse_descriptor;
use crate::crawler::expansion::{artifact_key, DependencyPlan, ExpansionPolicy};
use crate::crawler::fetcher::{Download, FetchError, Fetcher};
use crate::crawler::frontier::{Claim, Frontier, WorkItem};
use crate::crawler::index::parse_index;
use crate::output::{CrawlStats, CrawlSummary};
use crate::repo::RepoPath;
use crate::state::WorkerRole;
use crate::storage::{open_store, StateStore};
use crate::MirrorError;
use chrono::Utc;
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Completed files between progress log lines
const PROGRESS_EVERY: u64 = 100;

/// Requests a graceful stop of a running coordinator
///
/// Cloneable and cheap; typically handed to a Ctrl-C listener.
#[derive(Debug, Clone)]
pub struct StopHandle {
    frontier: Arc<Frontier>,
}

impl StopHandle {
    /// Stops handing out work; in-flight items finish and pending work is saved
    pub fn stop(&self) {
        self.frontier.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.frontier.stop_requested()
    }
}

/// State shared by every worker task
struct CrawlContext {
    frontier: Arc<Frontier>,
    fetcher: Fetcher,
    policy: ExpansionPolicy,
    store: Arc<dyn StateStore>,
    stats: CrawlStats,
    output_root: PathBuf,
    max_requeues: u32,
    checkpoint_every: u64,
    config_hash: Option<String>,
    completions: AtomicU64,
    checkpoint_lock: Mutex<()>,
    started: Instant,
}

/// Main mirror coordinator structure
pub struct Coordinator {
    context: Arc<CrawlContext>,
    listing_workers: u32,
    fetch_workers: u32,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `seed` - Directory to start from when there is nothing to resume
    /// * `fresh` - Ignore any saved snapshot (the completion log still applies)
    /// * `config_hash` - Stored in snapshots; a mismatch on resume is logged
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(MirrorError)` - Bad mirror URLs, exclude patterns or HTTP client
    pub fn new(
        config: Config,
        seed: RepoPath,
        fresh: bool,
        config_hash: Option<String>,
    ) -> Result<Self, MirrorError> {
        let output_root = PathBuf::from(&config.output.root);
        let store = open_store(&output_root, &config.output.state_dir);
        let fetcher = Fetcher::from_config(&config)?;
        let policy = ExpansionPolicy::from_config(&config)?;
        let frontier = Arc::new(Frontier::new(Duration::from_millis(
            config.crawler.poll_interval_ms,
        )));

        // The completion log is always replayed, even for fresh runs
        match store.load_completed() {
            Ok(completed) => {
                if !completed.is_empty() {
                    tracing::info!("Loaded {} completed files", completed.len());
                }
                frontier.preload_completed(completed);
            }
            Err(e) => tracing::error!("Failed to read completion log: {}", e),
        }

        let resumed = if fresh {
            tracing::info!("Fresh run requested, ignoring saved snapshot");
            false
        } else {
            restore_snapshot(&store, &frontier, &policy, config_hash.as_deref())
        };

        if !resumed {
            match policy.excluded_by(&seed) {
                Some(pattern) => {
                    tracing::warn!("Seed {} is excluded by pattern '{}'", seed, pattern);
                }
                None => {
                    tracing::info!("Seeding frontier with {}", seed);
                    frontier.push_directory(WorkItem::new(seed, 0));
                }
            }
        }

        let context = CrawlContext {
            frontier,
            fetcher,
            policy,
            store: Arc::new(store),
            stats: CrawlStats::new(),
            output_root,
            max_requeues: config.crawler.max_requeues,
            checkpoint_every: config.crawler.checkpoint_every,
            config_hash,
            completions: AtomicU64::new(0),
            checkpoint_lock: Mutex::new(()),
            started: Instant::now(),
        };

        Ok(Self {
            context: Arc::new(context),
            listing_workers: config.crawler.listing_workers,
            fetch_workers: config.crawler.fetch_workers,
        })
    }

    /// Handle for stopping the run from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            frontier: Arc::clone(&self.context.frontier),
        }
    }

    /// The shared frontier, for inspecting results after a run
    pub fn frontier(&self) -> &Frontier {
        &self.context.frontier
    }

    /// Runs the worker pool until quiescence or a stop request
    ///
    /// This method:
    /// 1. Registers every worker slot
    /// 2. Spawns the listing and fetch workers
    /// 3. Waits for all of them to exit
    /// 4. Writes the final snapshot (empty when the crawl completed)
    /// 5. Returns the run summary
    pub async fn run(&mut self) -> Result<CrawlSummary, MirrorError> {
        let started = Instant::now();
        let (directories, files) = self.context.frontier.queue_lengths();
        tracing::info!(
            "Starting mirror: {} listing workers, {} fetch workers, {} directories and {} files queued",
            self.listing_workers,
            self.fetch_workers,
            directories,
            files
        );

        // All slots must exist before the first poll
        let mut slots = Vec::new();
        for _ in 0..self.listing_workers {
            let slot = self.context.frontier.register_worker(WorkerRole::Listing);
            slots.push((WorkerRole::Listing, slot));
        }
        for _ in 0..self.fetch_workers {
            let slot = self.context.frontier.register_worker(WorkerRole::Fetch);
            slots.push((WorkerRole::Fetch, slot));
        }

        let handles: Vec<_> = slots
            .into_iter()
            .map(|(role, slot)| tokio::spawn(Arc::clone(&self.context).worker_loop(role, slot)))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        let context = &self.context;
        let interrupted = context.frontier.stop_requested();
        context.checkpoint().await;

        let summary = context.stats.summarize(
            started.elapsed(),
            context.frontier.pending(),
            context.frontier.artifact_count(),
            interrupted,
        );

        if interrupted {
            tracing::info!(
                "Mirror interrupted: {} files fetched, {} items saved for the next run",
                summary.files_fetched,
                summary.pending
            );
        } else {
            tracing::info!(
                "Mirror completed: {} files fetched in {:?}",
                summary.files_fetched,
                summary.elapsed
            );
        }

        Ok(summary)
    }
}

/// Loads the saved snapshot into the frontier
///
/// Returns true if it produced any work.
fn restore_snapshot(
    store: &dyn StateStore,
    frontier: &Frontier,
    policy: &ExpansionPolicy,
    config_hash: Option<&str>,
) -> bool {
    let snapshot = match store.load_snapshot() {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            tracing::debug!("No saved snapshot");
            return false;
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable snapshot: {}", e);
            return false;
        }
    };

    if let (Some(saved), Some(current)) = (snapshot.config_hash.as_deref(), config_hash) {
        if saved != current {
            tracing::warn!("Configuration changed since the snapshot was saved");
        }
    }

    let (directories, files) = frontier.restore(&snapshot, |path| policy.is_descriptor(path));
    if directories + files == 0 {
        return false;
    }

    tracing::info!(
        "Resuming with {} directories and {} files from snapshot",
        directories,
        files
    );
    true
}

impl CrawlContext {
    async fn worker_loop(self: Arc<Self>, role: WorkerRole, slot: usize) {
        tracing::debug!("{} worker {} started", role.as_str(), slot);

        loop {
            let lease = match role {
                WorkerRole::Listing => self.frontier.next_directory(slot).await,
                WorkerRole::Fetch => self.frontier.next_file(slot).await,
            };
            let Some(lease) = lease else {
                break;
            };

            let item = lease.item();
            let outcome = match role {
                WorkerRole::Listing => {
                    AssertUnwindSafe(self.process_directory(item))
                        .catch_unwind()
                        .await
                }
                WorkerRole::Fetch => AssertUnwindSafe(self.process_file(item)).catch_unwind().await,
            };
            self.report_fault(item, outcome);

            // Slot goes idle only after all derived work was pushed
            drop(lease);
        }

        tracing::debug!("{} worker {} exiting", role.as_str(), slot);
    }

    fn report_fault(
        &self,
        item: &WorkItem,
        outcome: Result<Result<(), MirrorError>, Box<dyn Any + Send>>,
    ) {
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(_) => MirrorError::WorkerPanic {
                path: item.path.to_string(),
            },
        };

        CrawlStats::bump(&self.stats.worker_faults);
        tracing::error!("Abandoning {}: {}", item.path, error);
    }

    // ===== Listing =====

    /// Lists a directory and routes its children
    async fn process_directory(&self, item: &WorkItem) -> Result<(), MirrorError> {
        let listing = match self.fetcher.fetch_listing(&item.path).await {
            Ok(listing) => listing,
            Err(e) => {
                self.handle_fetch_failure(item, e, WorkerRole::Listing);
                return Ok(());
            }
        };
        CrawlStats::bump(&self.stats.directories_listed);

        let children = parse_index(&listing.body, &item.path);
        tracing::debug!(
            "Listed {} via {} ({} children)",
            item.path,
            listing.source,
            children.len()
        );

        let is_artifact = self.policy.is_artifact_dir(&item.path, &children);
        if is_artifact {
            if let Some(key) = artifact_key(&item.path) {
                if self.frontier.record_artifact(key.clone()) {
                    tracing::debug!("Artifact {}", key);
                }
            }
        }

        for child in children {
            // Versions and files of an artifact are never group candidates
            if !is_artifact {
                if let Some(pattern) = self.policy.excluded_by(&child) {
                    CrawlStats::bump(&self.stats.excluded);
                    tracing::debug!("Excluded {} (pattern '{}')", child, pattern);
                    continue;
                }
            }

            let next = WorkItem::new(child, item.depth);
            if next.path.is_directory() {
                self.frontier.push_directory(next);
            } else if self.frontier.is_completed(&next.path) {
                // Dependencies of a descriptor finished in an earlier run may
                // never have been expanded
                if self.policy.is_descriptor(&next.path) {
                    self.frontier.push_reindex(next);
                }
            } else {
                self.frontier.push_file(next);
            }
        }

        Ok(())
    }

    // ===== Download =====

    /// Claims, downloads and indexes one file
    async fn process_file(&self, item: &WorkItem) -> Result<(), MirrorError> {
        let path = &item.path;

        match self.frontier.claim_file(path) {
            Claim::Acquired => {}
            Claim::Completed if self.policy.is_descriptor(path) => {
                CrawlStats::bump(&self.stats.files_skipped);
                self.reindex_from_disk(item).await;
                return Ok(());
            }
            Claim::Completed | Claim::InProgress => {
                CrawlStats::bump(&self.stats.files_skipped);
                tracing::trace!("Skip {}: already handled", path);
                return Ok(());
            }
        }

        if self.frontier.stop_requested() {
            self.frontier.requeue_file(item.clone());
            return Ok(());
        }

        let target = path.local_path(&self.output_root);
        let is_descriptor = self.policy.is_descriptor(path);

        let on_disk = tokio::fs::metadata(&target)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);

        let body = if on_disk {
            CrawlStats::bump(&self.stats.files_skipped);
            tracing::debug!("Skip {}: already on disk", path);
            self.mark_completed(path, false).await;

            if is_descriptor {
                Some(tokio::fs::read(&target).await?)
            } else {
                None
            }
        } else {
            let download = match self.fetcher.fetch_file(path).await {
                Ok(download) => download,
                Err(e) => {
                    self.handle_fetch_failure(item, e, WorkerRole::Fetch);
                    return Ok(());
                }
            };
            let source = download.source.clone();

            match write_atomically(download, &target, is_descriptor).await {
                Ok((written, body)) => {
                    self.stats.add_bytes(written);
                    tracing::debug!("Fetched {} via {} ({} bytes)", path, source, written);
                    self.mark_completed(path, true).await;
                    body
                }
                Err(MirrorError::Reqwest(e)) => {
                    let error = FetchError::Transient {
                        url: format!("{}{}", source, path),
                        reason: e.to_string(),
                    };
                    self.handle_fetch_failure(item, error, WorkerRole::Fetch);
                    return Ok(());
                }
                Err(MirrorError::Fetch(error)) => {
                    self.handle_fetch_failure(item, error, WorkerRole::Fetch);
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(bytes) = body {
            if self.frontier.mark_indexed(path) {
                self.expand_descriptor(item, &bytes);
            }
        }

        Ok(())
    }

    /// Expands a completed descriptor from its local copy
    async fn reindex_from_disk(&self, item: &WorkItem) {
        if !self.frontier.mark_indexed(&item.path) {
            return;
        }

        let target = item.path.local_path(&self.output_root);
        match tokio::fs::read(&target).await {
            Ok(bytes) => {
                tracing::debug!("Re-indexing {} from disk", item.path);
                self.expand_descriptor(item, &bytes);
            }
            Err(e) => tracing::warn!("Cannot re-index {}: {}", item.path, e),
        }
    }

    /// Records a file as done: completed set, completion log, counters
    async fn mark_completed(&self, path: &RepoPath, fetched: bool) {
        self.frontier.complete_file(path);

        let store = Arc::clone(&self.store);
        let logged = path.clone();
        match tokio::task::spawn_blocking(move || store.append_completed(&logged)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to record {} as completed: {}", path, e),
            Err(e) => tracing::error!("Completion log task for {} failed: {}", path, e),
        }

        if fetched {
            let fetched = CrawlStats::bump(&self.stats.files_fetched);
            if fetched % PROGRESS_EVERY == 0 {
                let (directories, files) = self.frontier.queue_lengths();
                let rate = fetched as f64 / self.started.elapsed().as_secs_f64().max(0.001);
                tracing::info!(
                    "Progress: {} files fetched, {} directories and {} files queued, {:.2} files/sec",
                    fetched,
                    directories,
                    files,
                    rate
                );
            }
        }

        let completions = self.completions.fetch_add(1, Ordering::Relaxed) + 1;
        if self.checkpoint_every > 0 && completions % self.checkpoint_every == 0 {
            self.checkpoint().await;
        }
    }

    /// Schedules the dependencies a descriptor declares
    fn expand_descriptor(&self, item: &WorkItem, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        let coordinates = parse_descriptor(&text);
        tracing::debug!("{} declares {} dependencies", item.path, coordinates.len());

        for coordinate in coordinates {
            match self.policy.plan_dependency(&coordinate, item.depth) {
                DependencyPlan::Enqueue { path, depth } => {
                    if self.frontier.push_directory(WorkItem::new(path.clone(), depth)) {
                        CrawlStats::bump(&self.stats.dependencies_scheduled);
                        tracing::debug!("Scheduled dependency {} -> {}", coordinate, path);
                    }
                }
                DependencyPlan::Defer(path) => {
                    if self.frontier.record_deferred(path.clone()) {
                        CrawlStats::bump(&self.stats.dependencies_deferred);
                        tracing::debug!("Deferred dependency {} (depth {})", path, item.depth);
                    }
                }
                DependencyPlan::Excluded { path, pattern } => {
                    CrawlStats::bump(&self.stats.excluded);
                    tracing::debug!("Excluded dependency {} (pattern '{}')", path, pattern);
                }
                DependencyPlan::Unmappable => {
                    tracing::trace!("Dependency {} has no repository path", coordinate);
                }
            }
        }
    }

    // ===== Failures and persistence =====

    /// Drops or requeues an item whose fetch failed at every base
    fn handle_fetch_failure(&self, item: &WorkItem, error: FetchError, role: WorkerRole) {
        match error {
            FetchError::NotFound { .. } => {
                CrawlStats::bump(&self.stats.not_found);
                tracing::warn!("Dropping {}: {}", item.path, error);
            }
            FetchError::Transient { .. } if item.attempts < self.max_requeues => {
                CrawlStats::bump(&self.stats.requeued);
                tracing::warn!(
                    "Requeueing {} (attempt {}): {}",
                    item.path,
                    item.attempts + 1,
                    error
                );
                match role {
                    WorkerRole::Listing => self.frontier.requeue_directory(item.retry()),
                    WorkerRole::Fetch => self.frontier.requeue_file(item.retry()),
                }
            }
            FetchError::Transient { .. } => {
                CrawlStats::bump(&self.stats.failed);
                tracing::error!(
                    "Giving up on {} after {} attempts: {}",
                    item.path,
                    item.attempts + 1,
                    error
                );
            }
        }
    }

    /// Writes the current snapshot; failures are logged and ignored
    async fn checkpoint(&self) {
        let _guard = self.checkpoint_lock.lock().await;

        let mut snapshot = self.frontier.snapshot();
        snapshot.config_hash = self.config_hash.clone();
        snapshot.saved_at = Some(Utc::now());

        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.save_snapshot(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to save snapshot: {}", e),
            Err(e) => tracing::error!("Snapshot task failed: {}", e),
        }
    }
}

/// Streams a download to `<name>.part` and renames it onto `target`
///
/// # Returns
///
/// * `Ok((bytes, body))` - Bytes written, plus the body when `keep_body` is set
/// * `Err(MirrorError::Reqwest)` - The body broke off mid-stream
/// * `Err(MirrorError::Fetch)` - The body stalled for longer than the idle timeout
/// * `Err(MirrorError::Io)` - The file could not be written
async fn write_atomically(
    download: Download,
    target: &Path,
    keep_body: bool,
) -> Result<(u64, Option<Vec<u8>>), MirrorError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = part_path(target);
    let result = match stream_to_file(download, &tmp, keep_body).await {
        Ok(written) => tokio::fs::rename(&tmp, target)
            .await
            .map(|_| written)
            .map_err(MirrorError::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

async fn stream_to_file(
    download: Download,
    tmp: &Path,
    keep_body: bool,
) -> Result<(u64, Option<Vec<u8>>), MirrorError> {
    let mut file = tokio::fs::File::create(tmp).await?;
    let url = download.response.url().clone();
    let idle = download.idle_timeout;
    let mut stream = download.response.bytes_stream();
    let mut body = keep_body.then(Vec::new);
    let mut written = 0u64;

    loop {
        let chunk = match tokio::time::timeout(idle, stream.next()).await {
            Ok(Some(chunk)) => chunk?,
            Ok(None) => break,
            Err(_) => {
                return Err(FetchError::Transient {
                    url: url.to_string(),
                    reason: format!("no data for {}s", idle.as_secs()),
                }
                .into())
            }
        };
        file.write_all(&chunk).await?;
        if let Some(body) = body.as_mut() {
            body.extend_from_slice(&chunk);
        }
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok((written, body))
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    target.with_file_name(name)
}

/// Runs a complete mirror operation
///
/// This is the simplest entry point: build a coordinator that resumes any
/// saved snapshot and run it to completion.
///
/// # Arguments
///
/// * `config` - The mirror configuration
/// * `seed` - Directory to start from
///
/// # Example
///
/// ```no_run
/// use mvn_mirror::config::load_config;
/// use mvn_mirror::crawler::run_crawl;
/// use mvn_mirror::repo::RepoPath;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let summary = run_crawl(config, RepoPath::seed("org/slf4j")?).await?;
/// println!("{} files fetched", summary.files_fetched);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, seed: RepoPath) -> Result<CrawlSummary, MirrorError> {
    let mut coordinator = Coordinator::new(config, seed, false, None)?;
    coordinator.run().await
}
