//! Crawl counters and the end-of-run summary
//!
//! Workers bump the counters concurrently; the coordinator freezes them into
//! a `CrawlSummary` once the pool has stopped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters shared by all workers
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub directories_listed: AtomicU64,
    pub files_fetched: AtomicU64,
    pub bytes_written: AtomicU64,
    pub files_skipped: AtomicU64,
    pub not_found: AtomicU64,
    pub failed: AtomicU64,
    pub requeued: AtomicU64,
    pub excluded: AtomicU64,
    pub dependencies_scheduled: AtomicU64,
    pub dependencies_deferred: AtomicU64,
    pub worker_faults: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to a counter and returns the new value
    pub fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Freezes the counters into a summary
    pub fn summarize(
        &self,
        elapsed: Duration,
        pending: usize,
        artifacts: usize,
        interrupted: bool,
    ) -> CrawlSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CrawlSummary {
            directories_listed: load(&self.directories_listed),
            files_fetched: load(&self.files_fetched),
            bytes_written: load(&self.bytes_written),
            files_skipped: load(&self.files_skipped),
            not_found: load(&self.not_found),
            failed: load(&self.failed),
            requeued: load(&self.requeued),
            excluded: load(&self.excluded),
            dependencies_scheduled: load(&self.dependencies_scheduled),
            dependencies_deferred: load(&self.dependencies_deferred),
            worker_faults: load(&self.worker_faults),
            artifacts_detected: artifacts as u64,
            pending,
            elapsed,
            interrupted,
        }
    }
}

/// Final, immutable view of a crawl
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSummary {
    pub directories_listed: u64,
    pub files_fetched: u64,
    pub bytes_written: u64,
    pub files_skipped: u64,
    pub not_found: u64,
    pub failed: u64,
    pub requeued: u64,
    pub excluded: u64,
    pub dependencies_scheduled: u64,
    pub dependencies_deferred: u64,
    pub worker_faults: u64,
    pub artifacts_detected: u64,

    /// Items left in the snapshot for the next run
    pub pending: usize,

    pub elapsed: Duration,

    /// True if the run was stopped before reaching quiescence
    pub interrupted: bool,
}

impl CrawlSummary {
    /// Items that were dropped and will only be retried if rediscovered
    pub fn dropped(&self) -> u64 {
        self.not_found + self.failed + self.worker_faults
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    if summary.interrupted {
        println!("=== Mirror Interrupted ===\n");
    } else {
        println!("=== Mirror Complete ===\n");
    }

    println!("Files:");
    println!("  Fetched: {}", summary.files_fetched);
    println!("  Skipped (already present): {}", summary.files_skipped);
    println!("  Not found: {}", summary.not_found);
    println!("  Failed: {}", summary.failed);
    println!("  Written: {}", format_bytes(summary.bytes_written));
    println!();

    println!("Traversal:");
    println!("  Directories listed: {}", summary.directories_listed);
    println!("  Artifacts detected: {}", summary.artifacts_detected);
    println!("  Excluded: {}", summary.excluded);
    println!("  Dependencies scheduled: {}", summary.dependencies_scheduled);
    println!("  Dependencies deferred: {}", summary.dependencies_deferred);
    println!("  Requeued after transient errors: {}", summary.requeued);
    if summary.worker_faults > 0 {
        println!("  Worker faults: {}", summary.worker_faults);
    }
    println!();

    let secs = summary.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        summary.files_fetched as f64 / secs
    } else {
        0.0
    };
    println!("Elapsed: {:.1}s ({:.2} files/sec)", secs, rate);

    if summary.pending > 0 {
        println!(
            "Pending: {} items saved for the next run",
            summary.pending
        );
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
