/// Logical repository paths
///
/// A `RepoPath` addresses a directory or a file inside the mirrored
/// repository. Directories always end in `/`; that suffix is the only thing
/// that decides whether a path is listed or fetched.
use crate::{PathError, PathResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Whether a path names something to list or something to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    Directory,
    File,
}

/// A validated, slash-delimited location inside the repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// Parses a path, inferring its kind from the trailing separator
    ///
    /// # Validation Rules
    ///
    /// - must not be empty
    /// - must be relative (no leading `/`, no scheme)
    /// - no empty, `.` or `..` segments
    /// - no backslashes, `?` or `#` (they would not survive URL joining)
    ///
    /// # Examples
    ///
    /// ```
    /// use mvn_mirror::repo::{PathKind, RepoPath};
    ///
    /// let dir = RepoPath::parse("org/slf4j/").unwrap();
    /// assert_eq!(dir.kind(), PathKind::Directory);
    ///
    /// let file = RepoPath::parse("org/slf4j/slf4j-api/2.0.9/slf4j-api-2.0.9.pom").unwrap();
    /// assert_eq!(file.kind(), PathKind::File);
    ///
    /// assert!(RepoPath::parse("org/../etc/").is_err());
    /// ```
    pub fn parse(raw: &str) -> PathResult<Self> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if raw.starts_with('/') || raw.contains("://") {
            return Err(PathError::Absolute(raw.to_string()));
        }

        let body = raw.strip_suffix('/').unwrap_or(raw);
        for segment in body.split('/') {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['\\', '?', '#'])
            {
                return Err(PathError::InvalidSegment {
                    path: raw.to_string(),
                    segment: segment.to_string(),
                });
            }
        }

        Ok(Self(raw.to_string()))
    }

    /// Parses a path that must be a directory
    pub fn directory(raw: &str) -> PathResult<Self> {
        let path = Self::parse(raw)?;
        if path.kind() != PathKind::Directory {
            return Err(PathError::NotDirectory(raw.to_string()));
        }
        Ok(path)
    }

    /// Normalizes user input (e.g. a CLI seed) into a directory path
    ///
    /// Leading separators are stripped and a trailing one is added.
    pub fn seed(raw: &str) -> PathResult<Self> {
        let trimmed = raw.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        if trimmed.ends_with('/') {
            Self::directory(trimmed)
        } else {
            Self::directory(&format!("{}/", trimmed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> PathKind {
        if self.0.ends_with('/') {
            PathKind::Directory
        } else {
            PathKind::File
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind() == PathKind::Directory
    }

    /// Path segments without the trailing separator
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.trim_end_matches('/').split('/')
    }

    /// Segments joined with `.`, the form exclude patterns are matched against
    pub fn dotted(&self) -> String {
        self.segments().collect::<Vec<_>>().join(".")
    }

    /// Last segment, without the trailing separator
    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or_default()
    }

    /// The enclosing directory, if any
    pub fn parent(&self) -> Option<RepoPath> {
        let body = self.0.trim_end_matches('/');
        body.rfind('/').map(|idx| Self(body[..=idx].to_string()))
    }

    /// Returns true if `other` lies strictly below this directory
    pub fn contains(&self, other: &RepoPath) -> bool {
        self.is_directory() && other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }

    /// Location of this path under a local output root
    pub fn local_path(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RepoPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
