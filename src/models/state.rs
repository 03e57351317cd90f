//! Process lifecycle state and its transition rules.

use std::fmt::{Display, Formatter};

/// Lifecycle state of a supervised process.
///
/// Moves monotonically through
/// `Starting → Running → (Paused ↔ Running)* → Terminating → Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// Spawn requested; streams not yet handed to the I/O tasks.
    Starting,
    /// Process running with reader and writer tasks attached.
    Running,
    /// Process frozen with `SIGSTOP`.
    Paused,
    /// Termination requested; waiting for exit and task shutdown.
    Terminating,
    /// Process exited and all owned tasks joined. Terminal.
    Dead,
}

impl ProcessState {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Starting | Self::Paused, Self::Running)
                | (Self::Running, Self::Paused)
                | (
                    Self::Starting | Self::Running | Self::Paused,
                    Self::Terminating
                )
                | (Self::Terminating, Self::Dead)
        )
    }

    /// Whether the process is still considered usable.
    #[must_use]
    pub fn is_alive(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Paused)
    }
}

impl Display for ProcessState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Terminating => "terminating",
            Self::Dead => "dead",
        };
        f.write_str(name)
    }
}
