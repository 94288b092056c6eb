use crate::repo::RepoPath;
use crate::{ConfigError, ConfigResult};

/// Checks if a dot-joined candidate matches an exclude pattern
///
/// Patterns are compared segment by segment:
/// 1. Every pattern segment must match the candidate segment at the same position
/// 2. A `*` segment matches any single segment
/// 3. The candidate may have more segments than the pattern, so a pattern
///    covers everything below the group or artifact it names
///
/// # Arguments
///
/// * `pattern` - The exclude pattern, e.g. `org.example` or `org.*.internal`
/// * `candidate` - Dot-joined path segments, e.g. `org.example.core.1.0`
///
/// # Examples
///
/// ```
/// use mvn_mirror::repo::matches_pattern;
///
/// assert!(matches_pattern("org.example", "org.example"));
/// assert!(matches_pattern("org.example", "org.example.core"));
/// assert!(!matches_pattern("org.example", "org.examples"));
///
/// assert!(matches_pattern("org.*.internal", "org.acme.internal.tools"));
/// assert!(!matches_pattern("org.*.internal", "org.acme"));
/// ```
pub fn matches_pattern(pattern: &str, candidate: &str) -> bool {
    let mut candidate_segments = candidate.split('.');

    for expected in pattern.split('.') {
        match candidate_segments.next() {
            Some(actual) if expected == "*" || expected == actual => continue,
            _ => return false,
        }
    }

    true
}

/// Compiled set of exclude patterns
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<String>,
}

impl ExcludeSet {
    /// Builds the set, rejecting malformed patterns
    pub fn new<I, S>(patterns: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(Into::into)
            .map(|p| validate_pattern(p.trim().to_string()))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the first pattern matching the path, if any
    pub fn matching(&self, path: &RepoPath) -> Option<&str> {
        let dotted = path.dotted();
        self.patterns
            .iter()
            .find(|p| matches_pattern(p, &dotted))
            .map(String::as_str)
    }
}

/// Validates a single pattern: non-empty dot-separated segments
pub fn validate_pattern(pattern: String) -> ConfigResult<String> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "exclude pattern cannot be empty".to_string(),
        ));
    }

    if pattern.split('.').any(|seg| seg.is_empty() || seg.contains('/')) {
        return Err(ConfigError::InvalidPattern(format!(
            "'{}' must be dot-separated non-empty segments",
            pattern
        )));
    }

    Ok(pattern)
}
