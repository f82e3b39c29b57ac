//! Control plane: configuration reads, runtime mutations and the stats
//! stream. Mutations swap whole config snapshots and never suspend while
//! holding shared state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::buffers::BufferEntry;
use crate::config::{validate_config, CanvasSize, ConfigError, DisplayConfig, PanelConfig};
use crate::engine::{EngineEvent, EngineShared};
use crate::ingest::{ProducerRecord, ProducerRegistry};
use crate::mapper::{test_pattern, TestPattern};
use crate::observability::StatsSnapshot;
use crate::protocol::RbmFrame;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("fps {fps} outside [1, {fps_max}]")]
    FpsOutOfRange { fps: u32, fps_max: u32 },

    #[error(transparent)]
    InvalidTopology(#[from] ConfigError),
}

/// What this server supports, for producers that negotiate features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The RBM invert flag is honored (XOR after decode).
    pub invert_flag: bool,
    /// Buffered refresh with a trailing global flush is available.
    pub buffered_mode: bool,
    pub fps_max: u32,
}

/// One message on the stats stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub stats: StatsSnapshot,
    pub fps: u32,
    pub active_source: Option<String>,
}

#[derive(Clone)]
pub struct ControlPlane {
    shared: Arc<EngineShared>,
    registry: Arc<ProducerRegistry>,
    stream: broadcast::Sender<StatusReport>,
}

impl ControlPlane {
    pub fn new(shared: Arc<EngineShared>, registry: Arc<ProducerRegistry>) -> Self {
        let (stream, _) = broadcast::channel(32);
        Self {
            shared,
            registry,
            stream,
        }
    }

    // --- reads ---

    pub fn config(&self) -> Arc<DisplayConfig> {
        self.shared.config()
    }

    pub fn canvas(&self) -> CanvasSize {
        self.shared.config().canvas
    }

    pub fn topology(&self) -> Vec<PanelConfig> {
        self.shared.config().panels.clone()
    }

    pub fn fps(&self) -> u32 {
        self.shared.config().runtime.fps
    }

    pub fn active_source(&self) -> Option<String> {
        self.shared.active_source()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            invert_flag: true,
            buffered_mode: true,
            fps_max: self.shared.config().runtime.fps_max,
        }
    }

    pub fn producers(&self) -> Vec<ProducerRecord> {
        self.registry.snapshot()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared
            .metrics
            .snapshot(self.shared.buffer.occupancy(), self.shared.buffer.capacity())
    }

    // --- mutations ---

    /// Change the target cadence. Setting the current value is a no-op;
    /// otherwise the buffer is resized (newest entries kept) and the rate
    /// bucket re-sized to the new fps. Panel caches are untouched.
    pub fn set_fps(&self, fps: u32) -> Result<(), ControlError> {
        let current = self.shared.config();
        let fps_max = current.runtime.fps_max;
        if fps < 1 || fps > fps_max {
            return Err(ControlError::FpsOutOfRange { fps, fps_max });
        }
        if fps == current.runtime.fps {
            return Ok(());
        }

        let mut next = (*current).clone();
        next.runtime.fps = fps;
        let capacity = next.runtime.buffer_capacity();
        self.shared.publish_config(next);
        self.shared.buffer.resize(capacity);
        self.shared
            .rate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .reconfigure(fps);

        info!(fps, "target cadence changed");
        self.shared.emit(EngineEvent::FpsChanged(fps));
        Ok(())
    }

    /// Select which producer feeds the display. `None` means no source;
    /// the dispatcher keeps holding the last frame.
    pub fn set_active_source(&self, producer_id: Option<String>) {
        info!(source = ?producer_id, "active source changed");
        self.shared.set_active_source(producer_id);
    }

    /// Switch between instant and buffered panel refresh. The message
    /// bytes change with the mode, so every panel is rewritten next tick.
    pub fn set_buffered(&self, buffered: bool) {
        let current = self.shared.config();
        if current.runtime.buffered == buffered {
            return;
        }
        let mut next = (*current).clone();
        next.runtime.buffered = buffered;
        self.shared.publish_config(next);
        self.shared.request_full_write();
    }

    /// Publish a new canvas/topology. Invalidates every panel cache and
    /// forces a full write on the next tick.
    pub fn publish_topology(&self, config: DisplayConfig) -> Result<(), ControlError> {
        validate_config(&config)?;
        let capacity = config.runtime.buffer_capacity();
        let fps = config.runtime.fps;
        self.shared.publish_config(config);
        self.shared.buffer.resize(capacity);
        self.shared
            .rate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .reconfigure(fps);
        self.shared.request_full_write();
        info!("topology published, full write forced");
        Ok(())
    }

    /// Ask the dispatcher to reset the transport and leave `Degraded`.
    pub fn reset_transport(&self) {
        self.shared.request_transport_reset();
    }

    /// Inject a built-in test pattern as if it were the next frame.
    /// Operator path: bypasses dedupe and rate limiting.
    pub fn send_test_pattern(&self, pattern: TestPattern) {
        let config = self.shared.config();
        let bitmap = test_pattern(&config.canvas, pattern);
        let frame = RbmFrame {
            frame_duration_ms: config.runtime.interval_ms(),
            ..RbmFrame::zeroed(config.canvas.width, config.canvas.height)
        };
        let frame = RbmFrame {
            payload: bitmap.to_packed(),
            ..frame
        };
        self.shared.buffer.push(BufferEntry {
            frame,
            received_at: std::time::Instant::now(),
            producer_id: "control".to_string(),
        });
    }

    // --- stats stream ---

    pub fn subscribe(&self) -> broadcast::Receiver<StatusReport> {
        self.stream.subscribe()
    }

    fn report(&self) -> StatusReport {
        StatusReport {
            stats: self.stats(),
            fps: self.fps(),
            active_source: self.active_source(),
        }
    }

    /// Publish one report per second, plus one immediately after any
    /// engine event (fps change, source switch, worker lifecycle,
    /// degraded-state change).
    pub async fn run_stats_stream(self, mut shutdown: broadcast::Receiver<()>) {
        let mut events = self.shared.subscribe_events();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let _ = self.stream.send(self.report());
                }
                event = events.recv() => {
                    match event {
                        Ok(_) => {
                            let _ = self.stream.send(self.report());
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    }
}
