//! Crawler module for repository traversal and download
//!
//! This module contains the core mirroring logic, including:
//! - Mirror selection with fallback to the origin
//! - HTTP fetching of listings and files
//! - Directory listing and descriptor parsing
//! - The shared frontier and termination detection
//! - Overall coordination of the worker pool

mod coordinator;
mod descriptor;
mod expansion;
mod fetcher;
mod frontier;
mod index;
mod mirror;

pub use coordinator::{run_crawl, Coordinator, StopHandle};
pub use descriptor::parse_descriptor;
pub use expansion::{
    artifact_key, detector_for, AnyOf, ArtifactDetector, DependencyPlan, ExpansionPolicy,
    MetadataMarker, VersionedChildren,
};
pub use fetcher::{build_http_client, Download, FetchError, Fetcher, Listing};
pub use frontier::{Claim, Frontier, Lease, WorkItem};
pub use index::parse_index;
pub use mirror::{Attempt, MirrorResolver};
