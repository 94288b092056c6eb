//! Traversal policy
//!
//! This module decides what the workers do with what they discover:
//! - Whether a listed directory is an artifact directory
//! - Whether a child or dependency path is excluded
//! - Whether a dependency is enqueued now or deferred past the depth cap

use crate::config::{ArtifactDetection, Config, DescriptorConfig, TraversalStrategy};
use crate::repo::{DependencyCoordinate, ExcludeSet, ExpansionLevel, RepoPath};
use crate::ConfigResult;

/// Recognizes directories that hold a single artifact's versions or files
pub trait ArtifactDetector: Send + Sync + std::fmt::Debug {
    /// Decides from a directory's listed children
    fn is_artifact_dir(&self, dir: &RepoPath, children: &[RepoPath]) -> bool;
}

/// A directory containing the metadata marker file
#[derive(Debug, Clone)]
pub struct MetadataMarker {
    marker: String,
}

impl MetadataMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl ArtifactDetector for MetadataMarker {
    fn is_artifact_dir(&self, _dir: &RepoPath, children: &[RepoPath]) -> bool {
        children
            .iter()
            .any(|child| !child.is_directory() && child.name() == self.marker)
    }
}

/// A directory with at least one child directory whose name contains a digit
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionedChildren;

impl ArtifactDetector for VersionedChildren {
    fn is_artifact_dir(&self, _dir: &RepoPath, children: &[RepoPath]) -> bool {
        children
            .iter()
            .any(|child| child.is_directory() && child.name().chars().any(|c| c.is_ascii_digit()))
    }
}

/// Matches when any inner detector matches, checked in order
#[derive(Debug)]
pub struct AnyOf(Vec<Box<dyn ArtifactDetector>>);

impl ArtifactDetector for AnyOf {
    fn is_artifact_dir(&self, dir: &RepoPath, children: &[RepoPath]) -> bool {
        self.0.iter().any(|d| d.is_artifact_dir(dir, children))
    }
}

/// Builds the configured detector
pub fn detector_for(kind: ArtifactDetection, marker: &str) -> Box<dyn ArtifactDetector> {
    match kind {
        ArtifactDetection::MetadataMarker => Box::new(MetadataMarker::new(marker)),
        ArtifactDetection::VersionedChildren => Box::new(VersionedChildren),
        ArtifactDetection::Either => Box::new(AnyOf(vec![
            Box::new(MetadataMarker::new(marker)),
            Box::new(VersionedChildren),
        ])),
    }
}

/// What to do with one declared dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyPlan {
    /// List this directory at the given depth
    Enqueue { path: RepoPath, depth: u32 },

    /// Past the depth cap; remember it for a later run
    Defer(RepoPath),

    /// Matched an exclude pattern
    Excluded { path: RepoPath, pattern: String },

    /// The coordinate does not map onto a usable path
    Unmappable,
}

/// Traversal decisions shared by all workers
#[derive(Debug)]
pub struct ExpansionPolicy {
    strategy: TraversalStrategy,
    max_depth: u32,
    level: ExpansionLevel,
    exclude: ExcludeSet,
    detector: Box<dyn ArtifactDetector>,
    descriptors: DescriptorConfig,
}

impl ExpansionPolicy {
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let exclude = ExcludeSet::new(config.exclude.iter().map(|e| e.pattern.as_str()))?;
        let crawler = &config.crawler;

        Ok(Self {
            strategy: crawler.strategy,
            max_depth: crawler.max_depth,
            level: crawler.expand_to,
            exclude,
            detector: detector_for(crawler.artifact_detection, &crawler.metadata_marker),
            descriptors: config.descriptor.clone(),
        })
    }

    pub fn is_artifact_dir(&self, dir: &RepoPath, children: &[RepoPath]) -> bool {
        self.detector.is_artifact_dir(dir, children)
    }

    /// Returns the matching exclude pattern, if any
    pub fn excluded_by(&self, path: &RepoPath) -> Option<&str> {
        self.exclude.matching(path)
    }

    pub fn is_descriptor(&self, path: &RepoPath) -> bool {
        !path.is_directory() && self.descriptors.is_descriptor(path.name())
    }

    /// Decides what happens to a dependency found in a descriptor at `depth`
    ///
    /// # Strategies
    ///
    /// | Strategy | Descriptor depth | Result |
    /// |----------|------------------|--------|
    /// | flat | any | Enqueue at depth + 1 |
    /// | depth-bounded | < max depth | Enqueue at depth + 1 |
    /// | depth-bounded | >= max depth | Defer |
    ///
    /// Exclusion is checked before the depth cap.
    pub fn plan_dependency(&self, coordinate: &DependencyCoordinate, depth: u32) -> DependencyPlan {
        let Some(path) = coordinate.to_repo_path(self.level) else {
            return DependencyPlan::Unmappable;
        };

        if let Some(pattern) = self.excluded_by(&path) {
            return DependencyPlan::Excluded {
                pattern: pattern.to_string(),
                path,
            };
        }

        match self.strategy {
            TraversalStrategy::DepthBounded if depth >= self.max_depth => DependencyPlan::Defer(path),
            _ => DependencyPlan::Enqueue {
                path,
                depth: depth.saturating_add(1),
            },
        }
    }
}

/// `group:artifact` for an artifact directory
///
/// The last segment is the artifact id, the rest form the dotted group.
/// Returns `None` for a single-segment directory.
pub fn artifact_key(dir: &RepoPath) -> Option<String> {
    let segments: Vec<&str> = dir.segments().collect();
    let (artifact, group) = segments.split_last()?;
    if group.is_empty() {
        return None;
    }
    Some(format!("{}:{}", group.join("."), artifact))
}
