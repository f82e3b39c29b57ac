//! Mock byte sink: records every write so tests can assert byte-exact bus
//! traffic, and can be scripted to fail like real hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use super::TransportError;

/// A scripted failure the sink raises on an upcoming write.
#[derive(Debug, Clone)]
pub enum ScriptedFailure {
    Transient,
    Permanent,
}

#[derive(Default)]
struct Shared {
    writes: Vec<Vec<u8>>,
    failures: VecDeque<ScriptedFailure>,
}

pub struct MockSink {
    shared: Arc<Mutex<Shared>>,
    connected: bool,
    /// Extra latency added per write, simulating a slow bus.
    write_latency: Duration,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            connected: false,
            write_latency: Duration::ZERO,
        }
    }

    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Handle for tests: observe writes and script failures after the sink
    /// has been moved into the engine.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    pub async fn open(&mut self) -> Result<(), TransportError> {
        self.connected = true;
        debug!("mock sink connected");
        Ok(())
    }

    pub async fn close(&mut self) {
        self.connected = false;
        debug!("mock sink disconnected");
    }

    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::Transient("mock sink not connected".into()));
        }

        let scripted = {
            let mut shared = self.shared.lock().unwrap_or_else(|p| p.into_inner());
            shared.failures.pop_front()
        };
        match scripted {
            Some(ScriptedFailure::Transient) => {
                return Err(TransportError::Transient("scripted transient failure".into()));
            }
            Some(ScriptedFailure::Permanent) => {
                self.connected = false;
                return Err(TransportError::Permanent("scripted permanent failure".into()));
            }
            None => {}
        }

        if !self.write_latency.is_zero() {
            tokio::time::sleep(self.write_latency).await;
        }

        debug!(len = bytes.len(), "mock sink write");
        let mut shared = self.shared.lock().unwrap_or_else(|p| p.into_inner());
        shared.writes.push(bytes.to_vec());
        Ok(())
    }

    pub async fn sleep(&self, micros: u64) {
        tokio::time::sleep(Duration::from_micros(micros)).await;
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Test-side handle to a [`MockSink`] that has been moved into the engine.
#[derive(Clone)]
pub struct MockProbe {
    shared: Arc<Mutex<Shared>>,
}

impl MockProbe {
    /// All writes so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.shared
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .writes
            .clone()
    }

    pub fn write_count(&self) -> usize {
        self.shared
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .writes
            .len()
    }

    pub fn clear_writes(&self) {
        self.shared
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .writes
            .clear();
    }

    /// Queue a failure for an upcoming write.
    pub fn fail_next(&self, failure: ScriptedFailure) {
        self.shared
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .failures
            .push_back(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_writes_in_order() {
        let mut sink = MockSink::new();
        let probe = sink.probe();

        sink.open().await.unwrap();
        sink.write_all(&[1, 2, 3]).await.unwrap();
        sink.write_all(&[4]).await.unwrap();

        assert_eq!(probe.writes(), vec![vec![1, 2, 3], vec![4]]);
    }

    #[tokio::test]
    async fn test_write_before_open_is_transient() {
        let mut sink = MockSink::new();
        let err = sink.write_all(&[0]).await.unwrap_err();
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_scripted_permanent_failure_disconnects() {
        let mut sink = MockSink::new();
        let probe = sink.probe();
        sink.open().await.unwrap();

        probe.fail_next(ScriptedFailure::Permanent);
        let err = sink.write_all(&[0]).await.unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(probe.write_count(), 0);

        // still down until reopened
        assert!(sink.write_all(&[0]).await.is_err());
        sink.open().await.unwrap();
        sink.write_all(&[9]).await.unwrap();
        assert_eq!(probe.writes(), vec![vec![9]]);
    }
}
