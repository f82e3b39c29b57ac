pub mod keep_latest;

pub use keep_latest::{BufferEntry, BufferStats, KeepLatestBuffer};
