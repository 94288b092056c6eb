use crate::repo::RepoPath;

/// What a single worker is doing right now
///
/// Slots live only in memory; they exist so the quiescence check can tell
/// "queues empty" apart from "queues empty and nobody about to refill them".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkerSlot {
    #[default]
    Idle,
    Processing(RepoPath),
}

impl WorkerSlot {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Which queue a worker draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerRole {
    Listing,
    Fetch,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Fetch => "fetch",
        }
    }
}
