//! Descriptor (POM) dependency extraction
//!
//! Descriptors are read with a streaming XML reader. Namespace prefixes are
//! ignored, end tags need not match, and a document that breaks off keeps the
//! dependencies completed before the break.

use crate::repo::DependencyCoordinate;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeSet;

/// Fields of a `dependency` element that make up a coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Group,
    Artifact,
    Version,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"groupId" => Some(Self::Group),
            b"artifactId" => Some(Self::Artifact),
            b"version" => Some(Self::Version),
            _ => None,
        }
    }
}

/// A `dependency` element being read
#[derive(Debug, Default)]
struct PendingDependency {
    /// Element depth of the `dependency` start tag
    depth: usize,
    group: Option<String>,
    artifact: Option<String>,
    version: Option<String>,
    open: Option<(Field, String)>,
}

impl PendingDependency {
    fn at(depth: usize) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    /// Stores the text of a closed field; the first non-empty value wins
    fn close_field(&mut self) {
        let Some((field, text)) = self.open.take() else {
            return;
        };
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let slot = match field {
            Field::Group => &mut self.group,
            Field::Artifact => &mut self.artifact,
            Field::Version => &mut self.version,
        };
        if slot.is_none() {
            *slot = Some(text.to_string());
        }
    }

    fn into_coordinate(self) -> Option<DependencyCoordinate> {
        let group = self.group?;
        let coordinate = DependencyCoordinate::from_fields(
            &group,
            self.artifact.as_deref(),
            self.version.as_deref(),
        );
        if coordinate.is_none() {
            tracing::trace!("Ignoring dependency with group {:?}", group);
        }
        coordinate
    }
}

/// Extracts the dependency coordinates a descriptor declares
///
/// Every `dependency` element contributes a coordinate when it has a usable
/// `groupId`; `artifactId` and `version` are optional. Only direct children
/// of `dependency` count, so `exclusions` never leak into the result.
/// Dependencies from `dependencyManagement` and plugin sections are included.
///
/// # Arguments
///
/// * `text` - The descriptor contents
///
/// # Returns
///
/// Distinct coordinates in sorted order; empty for input that is not XML
///
/// # Example
///
/// ```
/// use mvn_mirror::crawler::parse_descriptor;
///
/// let pom = r#"<project xmlns="http://maven.apache.org/POM/4.0.0">
///   <dependencies>
///     <dependency>
///       <groupId>org.slf4j</groupId>
///       <artifactId>slf4j-api</artifactId>
///       <optional/>
///       <version>2.0.9</version>
///     </dependency>
///   </dependencies>
/// </project>"#;
///
/// let deps = parse_descriptor(pom);
/// assert_eq!(deps.len(), 1);
/// assert_eq!(deps[0].to_string(), "org.slf4j:slf4j-api:2.0.9");
/// ```
pub fn parse_descriptor(text: &str) -> Vec<DependencyCoordinate> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = false;

    let mut coordinates = BTreeSet::new();
    let mut depth = 0usize;
    let mut current: Option<PendingDependency> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                depth += 1;
                let name = start.local_name();
                let name = name.as_ref();
                match current.as_ref().map(|dependency| dependency.depth) {
                    None if name == b"dependency" => {
                        current = Some(PendingDependency::at(depth));
                    }
                    Some(outer) if depth == outer + 1 => {
                        if let Some(dependency) = current.as_mut() {
                            dependency.open =
                                Field::from_name(name).map(|field| (field, String::new()));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                match current.as_ref().map(|dependency| dependency.depth) {
                    Some(outer) if depth == outer + 1 => {
                        if let Some(dependency) = current.as_mut() {
                            dependency.close_field();
                        }
                    }
                    Some(outer) if depth == outer => {
                        let finished = current.take().and_then(PendingDependency::into_coordinate);
                        if let Some(coordinate) = finished {
                            coordinates.insert(coordinate);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(text)) => {
                if let Some((_, buf)) = open_field(&mut current, depth) {
                    match text.unescape() {
                        Ok(unescaped) => buf.push_str(&unescaped),
                        Err(_) => buf.push_str(&String::from_utf8_lossy(&text)),
                    }
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some((_, buf)) = open_field(&mut current, depth) {
                    buf.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Ok(Event::Eof) => break,
            // Self-closing elements carry no text and leave the depth alone
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    "Descriptor unreadable after {} dependencies: {}",
                    coordinates.len(),
                    e
                );
                break;
            }
        }
    }

    coordinates.into_iter().collect()
}

/// The field being read, if text at `depth` belongs to one
fn open_field(
    current: &mut Option<PendingDependency>,
    depth: usize,
) -> Option<&mut (Field, String)> {
    let dependency = current.as_mut()?;
    if depth != dependency.depth + 1 {
        return None;
    }
    dependency.open.as_mut()
}
