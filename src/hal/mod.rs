//! Transport adapters: the opaque byte sinks the dispatcher writes panel
//! messages into. Mock and serial implementations are variants of a single
//! enum so the engine matches over them instead of boxing trait objects.

pub mod mock;
pub mod serial;
pub mod transport;

pub use mock::MockSink;
pub use serial::SerialSink;
pub use transport::{Transport, TransportError};
