//! Mirror selection
//!
//! Every fetch tries one randomly chosen mirror and then the canonical
//! origin. A failed base is never retried within the same fetch.

use crate::repo::RepoPath;
use rand::Rng;
use url::Url;

/// One endpoint to try for a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// The base the path was joined onto
    pub base: Url,

    /// Absolute URL to request
    pub url: Url,
}

/// Produces the ordered attempt sequence for a logical path
#[derive(Debug, Clone)]
pub struct MirrorResolver {
    origin: Url,
    mirrors: Vec<Url>,
}

impl MirrorResolver {
    /// Creates a resolver from an origin and an optional list of mirrors
    ///
    /// Bases are normalized to end with `/` so that joining appends the path
    /// instead of replacing the last segment of the base.
    ///
    /// # Example
    ///
    /// ```
    /// use mvn_mirror::crawler::MirrorResolver;
    /// use mvn_mirror::repo::RepoPath;
    ///
    /// let resolver = MirrorResolver::new(
    ///     "https://repo1.maven.org/maven2",
    ///     &["https://maven.aliyun.com/repository/public".to_string()],
    /// ).unwrap();
    ///
    /// let attempts = resolver.attempts(&RepoPath::parse("org/slf4j/").unwrap());
    /// assert_eq!(attempts.len(), 2);
    /// assert_eq!(attempts[0].url.as_str(), "https://maven.aliyun.com/repository/public/org/slf4j/");
    /// assert_eq!(attempts[1].url.as_str(), "https://repo1.maven.org/maven2/org/slf4j/");
    /// ```
    pub fn new(origin: &str, mirrors: &[String]) -> Result<Self, url::ParseError> {
        let origin = normalize_base(origin)?;
        let mirrors = mirrors
            .iter()
            .map(|m| normalize_base(m))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { origin, mirrors })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn mirrors(&self) -> &[Url] {
        &self.mirrors
    }

    /// Attempt sequence: one uniformly random mirror, then the origin
    pub fn attempts(&self, path: &RepoPath) -> Vec<Attempt> {
        let pick = if self.mirrors.is_empty() {
            None
        } else {
            Some(rand::rng().random_range(0..self.mirrors.len()))
        };
        self.attempts_with(path, pick)
    }

    /// Attempt sequence with an explicit mirror index
    fn attempts_with(&self, path: &RepoPath, mirror: Option<usize>) -> Vec<Attempt> {
        mirror
            .and_then(|idx| self.mirrors.get(idx))
            .into_iter()
            .chain(std::iter::once(&self.origin))
            .filter_map(|base| match join(base, path) {
                Ok(url) => Some(Attempt {
                    base: base.clone(),
                    url,
                }),
                Err(e) => {
                    tracing::warn!("Cannot join {} onto {}: {}", path, base, e);
                    None
                }
            })
            .collect()
    }
}

/// Parses a base URL and makes sure its path ends with `/`
fn normalize_base(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Joins a logical path onto a base
///
/// The `./` prefix keeps a first segment containing `:` from being read as
/// a URL scheme.
fn join(base: &Url, path: &RepoPath) -> Result<Url, url::ParseError> {
    base.join(&format!("./{}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> RepoPath {
        RepoPath::parse(raw).unwrap()
    }

    #[test]
    fn test_origin_only_without_mirrors() {
        let resolver = MirrorResolver::new("https://repo.example.com/maven2/", &[]).unwrap();
        let attempts = resolver.attempts(&path("g/a/"));

        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].url.as_str(), "https://repo.example.com/maven2/g/a/");
        assert_eq!(attempts[0].base.as_str(), "https://repo.example.com/maven2/");
    }

    #[test]
    fn test_mirror_then_origin() {
        let resolver = MirrorResolver::new(
            "https://origin.example.com/",
            &[
                "https://m1.example.com/repo/".to_string(),
                "https://m2.example.com/repo".to_string(),
            ],
        )
        .unwrap();

        let attempts = resolver.attempts_with(&path("g/x.jar"), Some(1));
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].url.as_str(), "https://m2.example.com/repo/g/x.jar");
        assert_eq!(attempts[1].url.as_str(), "https://origin.example.com/g/x.jar");
    }

    #[test]
    fn test_random_pick_always_in_range() {
        let mirrors: Vec<String> = (0..3)
            .map(|i| format!("https://m{}.example.com/", i))
            .collect();
        let resolver = MirrorResolver::new("https://origin.example.com/", &mirrors).unwrap();

        for _ in 0..50 {
            let attempts = resolver.attempts(&path("g/"));
            assert_eq!(attempts.len(), 2);
            assert!(resolver.mirrors().contains(&attempts[0].base));
            assert_eq!(&attempts[1].base, resolver.origin());
        }
    }

    #[test]
    fn test_base_normalization() {
        let resolver = MirrorResolver::new("https://origin.example.com/maven2", &[]).unwrap();
        assert_eq!(resolver.origin().as_str(), "https://origin.example.com/maven2/");
    }

    #[test]
    fn test_colon_in_first_segment_stays_relative() {
        let resolver = MirrorResolver::new("https://origin.example.com/r/", &[]).unwrap();
        let attempts = resolver.attempts(&path("weird:name/"));
        assert_eq!(
            attempts[0].url.as_str(),
            "https://origin.example.com/r/weird:name/"
        );
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(MirrorResolver::new("not a url", &[]).is_err());
        assert!(MirrorResolver::new("https://ok.example.com/", &["::".to_string()]).is_err());
    }
}
