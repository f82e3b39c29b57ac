pub mod buffers;
pub mod config;
pub mod control;
pub mod engine;
pub mod hal;
pub mod ingest;
pub mod mapper;
pub mod observability;
pub mod protocol;
pub mod resilience;

pub use config::{load_from_toml, DisplayConfig};
pub use control::ControlPlane;
pub use engine::{Dispatcher, EngineShared};
pub use ingest::{Forwarder, IngestOutcome, ProducerRegistry};
pub use observability::StatsSnapshot;
