//! Storage module for persisting crawl state
//!
//! This module handles everything that has to survive a restart:
//! - The snapshot of pending directory and file queues
//! - The append-only log of completed file paths
//! - Locating the hidden state directory under the output root

mod json;
mod snapshot;
mod traits;

pub use json::JsonStateStore;
pub use snapshot::{Snapshot, SnapshotEntry};
pub use traits::{StateStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the state store under `<output_root>/<state_dir>`
///
/// # Arguments
///
/// * `output_root` - The mirror output directory
/// * `state_dir` - Name of the hidden state directory
pub fn open_store(output_root: &Path, state_dir: &str) -> JsonStateStore {
    JsonStateStore::new(output_root.join(state_dir))
}
