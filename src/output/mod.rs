//! Output module for run statistics
//!
//! This module handles:
//! - Counting fetched, skipped and failed items while workers run
//! - Producing the final summary printed at exit

pub mod stats;

pub use stats::{print_summary, CrawlStats, CrawlSummary};
