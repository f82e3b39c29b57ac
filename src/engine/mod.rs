pub mod dirty;
pub mod dispatcher;
pub mod shared;
pub mod state;

pub use dirty::PanelCache;
pub use dispatcher::Dispatcher;
pub use shared::{EngineEvent, EngineShared};
pub use state::DispatcherState;
