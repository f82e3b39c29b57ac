//! Supervision policy: how long a producer may go silent, and how
//! aggressively it is restarted.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SupervisorPolicy {
    /// A running producer with no ingest heartbeat for this long is
    /// considered dead.
    pub heartbeat_timeout: Duration,
    /// How often the supervisor sweeps the registry.
    pub scan_interval: Duration,
    /// First restart delay; doubled on every consecutive restart.
    pub backoff_base: Duration,
    /// Ceiling for the exponential backoff.
    pub backoff_max: Duration,
    /// Give up after this many restarts inside `budget_window`.
    pub restart_budget: u32,
    pub budget_window: Duration,
    /// Bound on worker start/stop commands before escalating to abort.
    pub command_timeout: Duration,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(10),
            scan_interval: Duration::from_secs(2),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
            restart_budget: 5,
            budget_window: Duration::from_secs(60),
            command_timeout: Duration::from_secs(2),
        }
    }
}

impl SupervisorPolicy {
    /// Exponential backoff for the n-th consecutive restart (1-based),
    /// clamped to the ceiling.
    pub fn backoff_for(&self, restart_count: u32) -> Duration {
        let exponent = restart_count.saturating_sub(1).min(16);
        let delay = self.backoff_base.saturating_mul(1u32 << exponent);
        delay.min(self.backoff_max)
    }
}
