//! State shared between the forwarder, dispatcher, supervisor and control
//! plane. The configuration is an immutable snapshot behind a lock: writers
//! swap the whole `Arc`, readers clone it once per tick or request and
//! never hold it across a suspension point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::buffers::KeepLatestBuffer;
use crate::config::DisplayConfig;
use crate::ingest::TokenBucket;
use crate::observability::EngineMetrics;

/// Engine-level happenings the stats stream reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    FpsChanged(u32),
    ActiveSourceChanged(Option<String>),
    WorkerStarted(String),
    WorkerStopped(String),
    DegradedChanged(bool),
}

pub struct EngineShared {
    config: Mutex<Arc<DisplayConfig>>,
    pub buffer: KeepLatestBuffer,
    pub metrics: EngineMetrics,
    pub rate: Mutex<TokenBucket>,
    active_source: Mutex<Option<String>>,
    force_full_write: AtomicBool,
    transport_reset: AtomicBool,
    events: broadcast::Sender<EngineEvent>,
}

impl EngineShared {
    pub fn new(config: DisplayConfig) -> Arc<Self> {
        let capacity = config.runtime.buffer_capacity();
        let fps = config.runtime.fps;
        let (events, _) = broadcast::channel(64);

        Arc::new(Self {
            config: Mutex::new(Arc::new(config)),
            buffer: KeepLatestBuffer::new(capacity),
            metrics: EngineMetrics::new(),
            rate: Mutex::new(TokenBucket::sized_for_fps(fps)),
            active_source: Mutex::new(None),
            force_full_write: AtomicBool::new(false),
            transport_reset: AtomicBool::new(false),
            events,
        })
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<DisplayConfig> {
        Arc::clone(&self.config.lock().unwrap_or_else(|p| p.into_inner()))
    }

    /// Swap in a new configuration snapshot.
    pub fn publish_config(&self, config: DisplayConfig) {
        *self.config.lock().unwrap_or_else(|p| p.into_inner()) = Arc::new(config);
    }

    pub fn active_source(&self) -> Option<String> {
        self.active_source
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn set_active_source(&self, producer_id: Option<String>) {
        *self
            .active_source
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = producer_id.clone();
        self.emit(EngineEvent::ActiveSourceChanged(producer_id));
    }

    /// Producer-visible allowance: buffer slots not yet taken, minus the
    /// frame the dispatcher currently holds. Derived on every call, never
    /// stored, so concurrent ingest can only shrink it.
    pub fn credits(&self) -> u32 {
        let capacity = self.buffer.capacity() as i64;
        let occupancy = self.buffer.occupancy() as i64;
        let in_flight = self.metrics.in_flight() as i64;
        (capacity - occupancy - in_flight).max(0) as u32
    }

    /// Ask the dispatcher to rewrite every panel on its next tick.
    pub fn request_full_write(&self) {
        self.force_full_write.store(true, Ordering::Relaxed);
    }

    pub fn take_full_write_request(&self) -> bool {
        self.force_full_write.swap(false, Ordering::Relaxed)
    }

    /// Ask the dispatcher to reset the transport and leave `Degraded`.
    pub fn request_transport_reset(&self) {
        self.transport_reset.store(true, Ordering::Relaxed);
    }

    pub fn take_transport_reset_request(&self) -> bool {
        self.transport_reset.swap(false, Ordering::Relaxed)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}
