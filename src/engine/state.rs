//! Dispatcher lifecycle states.

use serde::{Deserialize, Serialize};

/// Where the pacing dispatcher is in its lifecycle.
///
/// `Running` is the only state that writes to the transport. `Degraded`
/// keeps draining the buffer so producers don't stall, but discards every
/// frame until the transport is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DispatcherState {
    #[default]
    Idle,
    Running,
    Degraded,
}

impl DispatcherState {
    /// Check if transition from current state to target state is valid.
    pub fn can_transition_to(&self, target: DispatcherState) -> bool {
        use DispatcherState::*;

        matches!(
            (self, target),
            (Idle, Running) | (Running, Idle) | (Running, Degraded) | (Degraded, Running) | (Degraded, Idle)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Degraded => "Degraded",
        }
    }
}
