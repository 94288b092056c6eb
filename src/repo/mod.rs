//! Repository model for mvn-mirror
//!
//! This module provides the logical path type used everywhere in the crawl,
//! dependency coordinates extracted from descriptors, and the exclude
//! pattern matcher.

mod coordinate;
mod matcher;
mod path;

// Re-export main types
pub use coordinate::{DependencyCoordinate, ExpansionLevel};
pub use matcher::{matches_pattern, validate_pattern, ExcludeSet};
pub use path::{PathKind, RepoPath};

/// Suffixes of checksum and signature files that are never mirrored
pub const CHECKSUM_SUFFIXES: &[&str] = &[".md5", ".sha1", ".sha256", ".sha512", ".asc"];

/// Returns true if the name ends with a checksum or signature suffix
pub fn is_checksum_name(name: &str) -> bool {
    CHECKSUM_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
