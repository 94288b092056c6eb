use crate::repo::RepoPath;
use serde::Deserialize;
use std::fmt;

/// How far a dependency coordinate is expanded into a repository path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpansionLevel {
    /// `group/` - every artifact of the group
    Group,
    /// `group/artifact/` - every version of the artifact
    Artifact,
    /// `group/artifact/version/` - the declared version only
    #[default]
    Version,
}

/// A dependency declared by a descriptor
///
/// Only the group is mandatory. Artifact and version are dropped when the
/// descriptor expresses them as placeholders or in a form that cannot be
/// used as a path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyCoordinate {
    pub group: String,
    pub artifact: Option<String>,
    pub version: Option<String>,
}

impl DependencyCoordinate {
    /// Builds a coordinate from raw descriptor text, discarding unusable fields
    ///
    /// Returns `None` when the group itself is unusable.
    ///
    /// # Examples
    ///
    /// ```
    /// use mvn_mirror::repo::DependencyCoordinate;
    ///
    /// let coord = DependencyCoordinate::from_fields("org.slf4j", Some("slf4j-api"), Some("${slf4j.version}")).unwrap();
    /// assert_eq!(coord.artifact.as_deref(), Some("slf4j-api"));
    /// assert_eq!(coord.version, None);
    ///
    /// assert!(DependencyCoordinate::from_fields("${project.groupId}", Some("x"), None).is_none());
    /// ```
    pub fn from_fields(group: &str, artifact: Option<&str>, version: Option<&str>) -> Option<Self> {
        let group = literal(group).filter(|g| is_valid_group(g))?;
        let artifact = artifact.and_then(literal).filter(|a| is_valid_segment(a));
        // A version without an artifact has nowhere to live in the layout
        let version = artifact
            .as_ref()
            .and(version)
            .and_then(literal)
            .filter(|v| is_valid_segment(v));

        Some(Self {
            group,
            artifact,
            version,
        })
    }

    /// Maps the coordinate onto the repository layout
    ///
    /// Group separators become path separators; artifact and version are
    /// appended as far as `level` allows and as far as they are known.
    pub fn to_repo_path(&self, level: ExpansionLevel) -> Option<RepoPath> {
        let mut path = self.group.replace('.', "/");
        path.push('/');

        if level != ExpansionLevel::Group {
            if let Some(artifact) = &self.artifact {
                path.push_str(artifact);
                path.push('/');

                if level == ExpansionLevel::Version {
                    if let Some(version) = &self.version {
                        path.push_str(version);
                        path.push('/');
                    }
                }
            }
        }

        RepoPath::directory(&path).ok()
    }
}

impl fmt::Display for DependencyCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group)?;
        if let Some(artifact) = &self.artifact {
            write!(f, ":{}", artifact)?;
        }
        if let Some(version) = &self.version {
            write!(f, ":{}", version)?;
        }
        Ok(())
    }
}

/// Trims a field and rejects property placeholders
fn literal(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() || value.starts_with("${") || value.contains("${") {
        return None;
    }
    Some(value.to_string())
}

fn is_valid_segment(value: &str) -> bool {
    value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
}

fn is_valid_group(value: &str) -> bool {
    value.split('.').all(|seg| {
        !seg.is_empty()
            && seg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    })
}
