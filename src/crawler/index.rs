//! Directory listing parser
//!
//! This module turns an HTML directory index into child paths:
//! - Every `<a href>` is resolved against the listed directory
//! - Only children strictly inside that directory are kept
//! - Parent links, query/fragment links and checksum files are dropped
//! - A trailing `/` marks a child as a directory

use crate::repo::{is_checksum_name, RepoPath};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Host used to resolve relative hrefs; never contacted
const LISTING_HOST: &str = "listing.invalid";

/// Extracts the children of a directory from its HTML index
///
/// Absolute hrefs are accepted when their path contains the listed
/// directory, which covers servers that render full URLs in their indexes.
///
/// # Arguments
///
/// * `html` - The listing body
/// * `dir` - The directory the listing belongs to
///
/// # Returns
///
/// Children in document order, without duplicates
///
/// # Example
///
/// ```
/// use mvn_mirror::crawler::parse_index;
/// use mvn_mirror::repo::RepoPath;
///
/// let html = r#"<a href="../">../</a><a href="1.0/">1.0/</a><a href="a.pom">a.pom</a><a href="a.pom.sha1">sha1</a>"#;
/// let dir = RepoPath::parse("g/a/").unwrap();
/// let children: Vec<String> = parse_index(html, &dir).iter().map(|p| p.to_string()).collect();
/// assert_eq!(children, vec!["g/a/1.0/", "g/a/a.pom"]);
/// ```
pub fn parse_index(html: &str, dir: &RepoPath) -> Vec<RepoPath> {
    let Some(base) = listing_base(dir) else {
        tracing::warn!("Cannot build a listing base for {}", dir);
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut children = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(child) = resolve_child(href, &base, dir) {
            if seen.insert(child.clone()) {
                children.push(child);
            }
        }
    }

    children
}

fn listing_base(dir: &RepoPath) -> Option<Url> {
    Url::parse(&format!("http://{}/", LISTING_HOST))
        .ok()?
        .join(&format!("./{}", dir))
        .ok()
}

/// Resolves one href and checks it lies inside `dir`
fn resolve_child(href: &str, base: &Url, dir: &RepoPath) -> Option<RepoPath> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('?') || href.starts_with('#') {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(absolute) => {
            if !matches!(absolute.scheme(), "http" | "https") {
                return None;
            }
            absolute
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => base.join(href).ok()?,
        Err(_) => return None,
    };
    if resolved.query().is_some() || resolved.fragment().is_some() {
        return None;
    }

    let prefix = format!("/{}", dir);
    let path = resolved.path();
    let relative_to_listing =
        resolved.host_str() == Some(LISTING_HOST) && !href.starts_with('/');
    let start = if relative_to_listing {
        path.starts_with(&prefix).then_some(0)?
    } else {
        // Absolute and root-relative links carry an unknown repository prefix
        path.find(&prefix)?
    };

    let child = RepoPath::parse(&path[start + 1..]).ok()?;
    if !dir.contains(&child) {
        return None;
    }
    if is_checksum_name(child.name()) {
        tracing::trace!("Skipping checksum {}", child);
        return None;
    }

    Some(child)
}
