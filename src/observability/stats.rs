//! Engine counters. All fields are atomics updated with relaxed ordering;
//! snapshots are taken without locks and are internally consistent enough
//! for monitoring.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Shared counter block for the whole engine. One instance per server,
/// written by the forwarder and the dispatcher, read by the control plane.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    // ingest side
    frames_received: AtomicU64,
    frames_forwarded: AtomicU64,
    duplicates_suppressed: AtomicU64,
    no_token_suppressed: AtomicU64,
    rejected: AtomicU64,

    // dispatcher side
    ticks: AtomicU64,
    panel_writes: AtomicU64,
    panel_skips: AtomicU64,
    encode_errors: AtomicU64,
    transient_errors: AtomicU64,
    degraded: AtomicBool,
    in_flight: AtomicU64,

    /// EMA of the effective frame rate, stored as f64 bits.
    effective_fps_bits: AtomicU64,
    last_tick_us: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.frames_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_no_token(&self) {
        self.no_token_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self, tick_us: u64) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_tick_us.store(tick_us, Ordering::Relaxed);
    }

    pub fn record_panel_write(&self) {
        self.panel_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panel_skip(&self) {
        self.panel_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Dispatcher holds at most one frame between pop and tick completion.
    pub fn set_in_flight(&self, held: bool) {
        self.in_flight.store(held as u64, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed) as usize
    }

    /// Fold one observed inter-tick interval into the effective-fps EMA
    /// (window of about 16 intervals).
    pub fn observe_interval(&self, interval_secs: f64) {
        if interval_secs <= 0.0 {
            return;
        }
        let instant = 1.0 / interval_secs;
        let prev = f64::from_bits(self.effective_fps_bits.load(Ordering::Relaxed));
        let next = if prev == 0.0 {
            instant
        } else {
            prev + (instant - prev) / 16.0
        };
        self.effective_fps_bits
            .store(next.to_bits(), Ordering::Relaxed);
    }

    pub fn effective_fps(&self) -> f64 {
        f64::from_bits(self.effective_fps_bits.load(Ordering::Relaxed))
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_forwarded(&self) -> u64 {
        self.frames_forwarded.load(Ordering::Relaxed)
    }

    pub fn duplicates_suppressed(&self) -> u64 {
        self.duplicates_suppressed.load(Ordering::Relaxed)
    }

    pub fn no_token_suppressed(&self) -> u64 {
        self.no_token_suppressed.load(Ordering::Relaxed)
    }

    pub fn panel_writes(&self) -> u64 {
        self.panel_writes.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, buffer_level: usize, buffer_capacity: usize) -> StatsSnapshot {
        StatsSnapshot {
            received: self.frames_received.load(Ordering::Relaxed),
            forwarded: self.frames_forwarded.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            no_token_suppressed: self.no_token_suppressed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            panel_writes: self.panel_writes.load(Ordering::Relaxed),
            panel_skips: self.panel_skips.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
            effective_fps: self.effective_fps(),
            last_tick_us: self.last_tick_us.load(Ordering::Relaxed),
            buffer_level,
            buffer_capacity,
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time statistics published to the control plane and the
/// stats stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub forwarded: u64,
    pub duplicates_suppressed: u64,
    pub no_token_suppressed: u64,
    pub rejected: u64,
    pub ticks: u64,
    pub panel_writes: u64,
    pub panel_skips: u64,
    pub encode_errors: u64,
    pub transient_errors: u64,
    pub effective_fps: f64,
    pub last_tick_us: u64,
    pub buffer_level: usize,
    pub buffer_capacity: usize,
    pub degraded: bool,
}
