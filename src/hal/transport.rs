//! The transport seam between the dispatcher and the bus.

use std::time::Duration;

use thiserror::Error;

use super::{MockSink, SerialSink};
use crate::config::SerialConfig;

/// Transport failures, already classified by the adapter that raised them.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Worth retrying on the next tick.
    #[error("transient transport error: {0}")]
    Transient(String),

    /// The adapter cannot recover; the dispatcher degrades until reset.
    #[error("permanent transport error: {0}")]
    Permanent(String),
}

impl TransportError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, TransportError::Permanent(_))
    }
}

/// A byte sink on the far side of the pacing engine. Exactly one task (the
/// dispatcher) owns the transport and writes to it.
pub enum Transport {
    Mock(MockSink),
    Serial(SerialSink),
}

impl Transport {
    /// Build the transport selected by the serial configuration.
    pub fn from_config(config: &SerialConfig) -> Self {
        if config.mock {
            Transport::Mock(MockSink::new())
        } else {
            Transport::Serial(SerialSink::new(config.clone()))
        }
    }

    pub async fn open(&mut self) -> Result<(), TransportError> {
        match self {
            Transport::Mock(sink) => sink.open().await,
            Transport::Serial(sink) => sink.open().await,
        }
    }

    pub async fn close(&mut self) {
        match self {
            Transport::Mock(sink) => sink.close().await,
            Transport::Serial(sink) => sink.close().await,
        }
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        match self {
            Transport::Mock(sink) => sink.write_all(bytes).await,
            Transport::Serial(sink) => sink.write_all(bytes).await,
        }
    }

    /// Pause between bus messages. Sub-millisecond waits are delegated to
    /// the runtime timer; the mock can stretch them for latency simulation.
    pub async fn sleep(&self, micros: u64) {
        match self {
            Transport::Mock(sink) => sink.sleep(micros).await,
            Transport::Serial(_) => tokio::time::sleep(Duration::from_micros(micros)).await,
        }
    }

    /// Re-open after a permanent failure. Success lets the dispatcher leave
    /// the degraded state.
    pub async fn reset(&mut self) -> Result<(), TransportError> {
        self.close().await;
        self.open().await
    }

    pub fn is_permanent_error(err: &TransportError) -> bool {
        err.is_permanent()
    }
}
