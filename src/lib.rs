//! mvn-mirror: a resumable mirror for directory-listing package repositories
//!
//! This crate walks a Maven-2 style repository over HTTP, downloads every file
//! it finds below a seed directory, and follows the dependencies declared in
//! downloaded descriptor (`.pom`) files, trying configured mirrors before the
//! canonical origin.

pub mod config;
pub mod crawler;
pub mod output;
pub mod repo;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for mvn-mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid repository path: {0}")]
    Path(#[from] PathError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker panicked while processing {path}")]
    WorkerPanic { path: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),
}

/// Repository path errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path must be relative: {0}")]
    Absolute(String),

    #[error("invalid segment {segment:?} in {path}")]
    InvalidSegment { path: String, segment: String },

    #[error("expected a directory path ending in '/': {0}")]
    NotDirectory(String),
}

/// Result type alias for mvn-mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for repository path operations
pub type PathResult<T> = std::result::Result<T, PathError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, StopHandle};
pub use repo::{DependencyCoordinate, RepoPath};
pub use state::{PoolState, WorkerSlot};
