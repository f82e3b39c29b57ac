pub mod stats;

pub use stats::{EngineMetrics, StatsSnapshot};
