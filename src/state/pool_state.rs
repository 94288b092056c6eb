/// Worker pool lifecycle states
///
/// This module defines the states the worker pool moves through between the
/// first poll and the last worker exiting.
use std::fmt;

/// Lifecycle of the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PoolState {
    /// Workers hand out and process items
    #[default]
    Running,

    /// A stop was requested: no new items are handed out, in-flight items finish
    Draining,

    /// Quiescence reached or drain finished; every worker exits
    Stopped,
}

impl PoolState {
    /// Returns true if workers may take new items
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if this is the final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Checks whether moving to `to` is a legal transition
    ///
    /// Running → Draining → Stopped, with Running → Stopped allowed directly
    /// on quiescence. Re-entering the current state is a no-op and allowed.
    pub fn can_transition_to(&self, to: PoolState) -> bool {
        match (self, to) {
            (a, b) if *a == b => true,
            (Self::Running, Self::Draining) => true,
            (Self::Running, Self::Stopped) => true,
            (Self::Draining, Self::Stopped) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
