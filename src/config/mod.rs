//! Configuration module for mvn-mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; command-line flags override individual values.
//!
//! # Example
//!
//! ```no_run
//! use mvn_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mvn-mirror.toml")).unwrap();
//! println!("Fetch workers: {}", config.crawler.fetch_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ArtifactDetection, Config, CrawlerConfig, DescriptorConfig, ExcludeEntry, MirrorConfig,
    OutputConfig, TraversalStrategy, UserAgentConfig, DEFAULT_ORIGIN,
};

// Re-export parser functions
pub use parser::{hash_content, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
