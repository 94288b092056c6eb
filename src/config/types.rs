use crate::repo::ExpansionLevel;
use serde::Deserialize;

/// Canonical Maven Central location used when no origin is configured
pub const DEFAULT_ORIGIN: &str = "https://repo1.maven.org/maven2/";

/// Main configuration structure for mvn-mirror
///
/// Every section is optional in the TOML file; missing sections fall back to
/// their defaults so the tool can run with no file at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mirrors: MirrorConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub descriptor: DescriptorConfig,
    #[serde(default)]
    pub exclude: Vec<ExcludeEntry>,
}

/// Fetch endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Canonical repository, always tried last
    pub origin: String,

    /// Mirrors tried first for directory listings
    pub index: Vec<String>,

    /// Mirrors tried first for file bodies
    pub download: Vec<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            index: Vec::new(),
            download: Vec::new(),
        }
    }
}

/// How dependency roots are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalStrategy {
    /// Dependencies become new roots with no depth cap
    #[default]
    Flat,
    /// Dependencies are expanded up to `max-depth` hops from the seed
    DepthBounded,
}

/// Which signal marks a directory as an artifact directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactDetection {
    /// A metadata marker file is present
    MetadataMarker,
    /// A child directory name contains a digit
    VersionedChildren,
    /// Marker first, then versioned children
    #[default]
    Either,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of workers draining the directory queue
    #[serde(rename = "listing-workers", default = "default_workers")]
    pub listing_workers: u32,

    /// Number of workers draining the file queue
    #[serde(rename = "fetch-workers", default = "default_workers")]
    pub fetch_workers: u32,

    /// Per-attempt timeout for directory listings (seconds)
    #[serde(rename = "listing-timeout-secs", default = "default_listing_timeout")]
    pub listing_timeout_secs: u64,

    /// Per-attempt timeout for file bodies (seconds)
    #[serde(rename = "file-timeout-secs", default = "default_file_timeout")]
    pub file_timeout_secs: u64,

    /// Upper bound on how long an idle worker waits before re-checking (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How many times a transiently failed item goes back on its queue
    #[serde(rename = "max-requeues", default = "default_max_requeues")]
    pub max_requeues: u32,

    /// Write a checkpoint snapshot every N completed files (0 disables)
    #[serde(rename = "checkpoint-every", default = "default_checkpoint_every")]
    pub checkpoint_every: u64,

    #[serde(default)]
    pub strategy: TraversalStrategy,

    /// Dependency hops expanded under the depth-bounded strategy
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(rename = "expand-to", default)]
    pub expand_to: ExpansionLevel,

    #[serde(rename = "artifact-detection", default)]
    pub artifact_detection: ArtifactDetection,

    /// File whose presence marks an artifact directory
    #[serde(rename = "metadata-marker", default = "default_metadata_marker")]
    pub metadata_marker: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            listing_workers: default_workers(),
            fetch_workers: default_workers(),
            listing_timeout_secs: default_listing_timeout(),
            file_timeout_secs: default_file_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_requeues: default_max_requeues(),
            checkpoint_every: default_checkpoint_every(),
            strategy: TraversalStrategy::default(),
            max_depth: default_max_depth(),
            expand_to: ExpansionLevel::default(),
            artifact_detection: ArtifactDetection::default(),
            metadata_marker: default_metadata_marker(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the operator, appended when present
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL)
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(url) => format!("{}/{} (+{})", self.crawler_name, self.crawler_version, url),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory the repository is mirrored into
    #[serde(default = "default_output_root")]
    pub root: String,

    /// Hidden directory under `root` holding the snapshot and completion log
    #[serde(rename = "state-dir", default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            state_dir: default_state_dir(),
        }
    }
}

/// Descriptor recognition
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorConfig {
    /// File name suffixes parsed for dependencies
    #[serde(default = "default_descriptor_suffixes")]
    pub suffixes: Vec<String>,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            suffixes: default_descriptor_suffixes(),
        }
    }
}

impl DescriptorConfig {
    pub fn is_descriptor(&self, name: &str) -> bool {
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }
}

/// Exclude pattern entry
#[derive(Debug, Clone, Deserialize)]
pub struct ExcludeEntry {
    /// Dot-joined group/artifact pattern (e.g. "org.example" or "org.*.internal")
    pub pattern: String,
}

fn default_workers() -> u32 {
    8
}

fn default_listing_timeout() -> u64 {
    10
}

fn default_file_timeout() -> u64 {
    20
}

fn default_poll_interval() -> u64 {
    200
}

fn default_max_requeues() -> u32 {
    2
}

fn default_checkpoint_every() -> u64 {
    250
}

fn default_max_depth() -> u32 {
    3
}

fn default_metadata_marker() -> String {
    "maven-metadata.xml".to_string()
}

fn default_crawler_name() -> String {
    "mvn-mirror".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_output_root() -> String {
    "downloads".to_string()
}

fn default_state_dir() -> String {
    ".mvn-mirror".to_string()
}

fn default_descriptor_suffixes() -> Vec<String> {
    vec![".pom".to_string()]
}
