//! The pacing dispatcher: a single periodic task that pulls one frame per
//! tick, maps it to panels, suppresses unchanged panels and writes the
//! rest to the bus. It is the only task that touches the transport.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::DisplayConfig;
use crate::hal::{Transport, TransportError};
use crate::mapper::{self, Bitmap};
use crate::protocol::{encode_flush, encode_panel_message, RefreshMode};

use super::dirty::{fingerprint, PanelCache};
use super::shared::{EngineEvent, EngineShared};
use super::state::DispatcherState;

pub struct Dispatcher {
    shared: Arc<EngineShared>,
    transport: Transport,
    cache: PanelCache,
    state: DispatcherState,
    /// Most recently written frame, reused when the buffer runs dry.
    hold: Bitmap,
    prev_tick: Option<Instant>,
}

impl Dispatcher {
    pub fn new(shared: Arc<EngineShared>, transport: Transport) -> Self {
        let canvas = shared.config().canvas;
        let hold = Bitmap::zeroed(canvas.width as usize, canvas.height as usize);
        Self {
            shared,
            transport,
            cache: PanelCache::new(),
            state: DispatcherState::Idle,
            hold,
            prev_tick: None,
        }
    }

    /// Run the paced write loop until the shutdown token fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        self.transition(DispatcherState::Running);

        if let Err(e) = self.transport.open().await {
            if e.is_permanent() {
                error!(error = %e, "transport open failed, starting degraded");
                self.enter_degraded();
            } else {
                warn!(error = %e, "transport open failed, will retry on tick writes");
            }
        }

        info!("dispatcher running");

        loop {
            let tick_start = Instant::now();
            if let Some(prev) = self.prev_tick {
                self.shared
                    .metrics
                    .observe_interval((tick_start - prev).as_secs_f64());
            }
            self.prev_tick = Some(tick_start);

            // one snapshot per tick, never held across the next one
            let config = self.shared.config();
            self.tick(&config).await;
            self.shared
                .metrics
                .record_tick(tick_start.elapsed().as_micros() as u64);

            let interval = Duration::from_millis(
                config.runtime.interval_ms() as u64 + config.runtime.frame_gap_ms as u64,
            );
            let deadline = tick_start + interval;
            let now = Instant::now();
            let sleep_for = if now < deadline {
                deadline - now
            } else {
                // overran: schedule from now, no drift make-up
                Duration::from_micros(config.runtime.inter_panel_us as u64)
            };

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }

        info!("dispatcher stopping");
        self.transition(DispatcherState::Idle);
        self.transport.close().await;
        Ok(())
    }

    /// One dispatcher tick. Pops at most one frame, then runs the
    /// map / dirty-check / write pipeline over the hold frame.
    async fn tick(&mut self, config: &DisplayConfig) {
        if self.shared.take_transport_reset_request() {
            match self.transport.reset().await {
                Ok(()) => {
                    info!("transport reset, forcing full write");
                    self.cache.force_all();
                    if self.state == DispatcherState::Degraded {
                        self.transition(DispatcherState::Running);
                        self.shared.metrics.set_degraded(false);
                        self.shared.emit(EngineEvent::DegradedChanged(false));
                    }
                }
                Err(e) => warn!(error = %e, "transport reset failed"),
            }
        }

        if self.shared.take_full_write_request() {
            self.cache.force_all();
        }

        if let Some(entry) = self.shared.buffer.pop() {
            self.shared.metrics.set_in_flight(true);
            let frame = &entry.frame;
            let mut bitmap = Bitmap::from_packed(
                &frame.payload,
                frame.width as usize,
                frame.height as usize,
            );
            if frame.invert() {
                bitmap = bitmap.invert();
            }
            self.hold = bitmap;
        }

        // degraded: keep draining so producers don't stall, write nothing
        if self.state != DispatcherState::Running {
            self.shared.metrics.set_in_flight(false);
            return;
        }

        self.write_panels(config).await;
        self.shared.metrics.set_in_flight(false);
    }

    async fn write_panels(&mut self, config: &DisplayConfig) {
        let mapped = match mapper::map(&self.hold, config) {
            Ok(mapped) => mapped,
            Err(e) => {
                error!(error = %e, "mapping failed, aborting tick");
                self.shared.metrics.record_encode_error();
                return;
            }
        };

        let mode = if config.runtime.buffered {
            RefreshMode::Buffered
        } else {
            RefreshMode::Instant
        };
        let write_timeout = Duration::from_millis(config.runtime.write_timeout_ms as u64);
        let inter_panel_us = config.runtime.inter_panel_us as u64;

        let mut wrote_any = false;
        for panel in &mapped {
            let hash = fingerprint(&panel.columns);
            if !self.cache.is_dirty(&panel.id, hash) {
                self.shared.metrics.record_panel_skip();
                continue;
            }

            let message = match encode_panel_message(
                panel.address,
                panel.width,
                panel.height,
                mode,
                &panel.columns,
            ) {
                Ok(message) => message,
                Err(e) => {
                    error!(panel = %panel.id, error = %e, "panel encode failed, aborting tick");
                    self.shared.metrics.record_encode_error();
                    return;
                }
            };

            if wrote_any && inter_panel_us > 0 {
                self.transport.sleep(inter_panel_us).await;
            }

            match self.write_with_timeout(&message, write_timeout).await {
                Ok(()) => {
                    self.cache.commit(&panel.id, hash);
                    self.shared.metrics.record_panel_write();
                    wrote_any = true;
                    debug!(panel = %panel.id, bytes = message.len(), "panel written");
                }
                Err(e) => {
                    // caches for panels already written this tick stay valid
                    self.cache.invalidate(&panel.id);
                    if e.is_permanent() {
                        error!(panel = %panel.id, error = %e, "permanent transport failure");
                        self.enter_degraded();
                    } else {
                        warn!(panel = %panel.id, error = %e, "transient write failure, retrying next tick");
                        self.shared.metrics.record_transient_error();
                    }
                    return;
                }
            }
        }

        if wrote_any && mode == RefreshMode::Buffered {
            if let Err(e) = self.write_with_timeout(&encode_flush(), write_timeout).await {
                if e.is_permanent() {
                    error!(error = %e, "permanent transport failure on flush");
                    self.enter_degraded();
                } else {
                    warn!(error = %e, "transient flush failure");
                    self.shared.metrics.record_transient_error();
                }
            }
        }
    }

    async fn write_with_timeout(
        &mut self,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        match tokio::time::timeout(timeout, self.transport.write_all(bytes)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Transient(format!(
                "write timed out after {timeout:?}"
            ))),
        }
    }

    fn enter_degraded(&mut self) {
        self.transition(DispatcherState::Degraded);
        self.shared.metrics.set_degraded(true);
        self.shared.emit(EngineEvent::DegradedChanged(true));
    }

    fn transition(&mut self, target: DispatcherState) {
        if self.state == target {
            return;
        }
        if !self.state.can_transition_to(target) {
            warn!(from = self.state.name(), to = target.name(), "invalid state transition ignored");
            return;
        }
        self.state = target;
    }

    #[cfg(test)]
    fn state(&self) -> DispatcherState {
        self.state
    }
}
