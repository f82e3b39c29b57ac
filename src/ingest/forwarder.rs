//! The per-frame ingest pipeline: parse, validate, heartbeat, dedupe,
//! rate-limit, rewrite cadence, enqueue. Strictly sequential per producer;
//! nothing here suspends, so frames from one producer are processed in
//! arrival order.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::buffers::BufferEntry;
use crate::engine::EngineShared;
use crate::engine::dirty::fingerprint;
use crate::protocol::{CodecError, RbmFrame, RbmHeader, HEADER_LEN};

use super::registry::ProducerRegistry;

/// Rejections surfaced to the producer as client errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("bad frame header: {0}")]
    BadHeader(#[from] CodecError),

    #[error("geometry mismatch: frame is {width}x{height}, canvas is {canvas_w}x{canvas_h}")]
    GeometryMismatch {
        width: u16,
        height: u16,
        canvas_w: u16,
        canvas_h: u16,
    },
}

/// What happened to an accepted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Forwarded into the pacing buffer.
    Queued,
    /// Same payload as the producer's previous frame; dropped.
    Duplicate,
    /// Rate limiter had no token; dropped.
    NoToken,
    /// Producer is not the active source; heartbeat recorded only.
    Observed,
}

/// Returned for every accepted frame so producers can self-pace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestResponse {
    pub outcome: IngestOutcome,
    pub credits: u32,
    pub retry_after_ms: Option<u64>,
    /// Sequence number of the submitted frame, acknowledged back.
    pub seq_ack: u32,
}

pub struct Forwarder {
    shared: Arc<EngineShared>,
    registry: Arc<ProducerRegistry>,
}

impl Forwarder {
    pub fn new(shared: Arc<EngineShared>, registry: Arc<ProducerRegistry>) -> Self {
        Self { shared, registry }
    }

    /// Run one submitted frame through the ingest pipeline.
    pub fn submit(&self, producer_id: &str, data: &[u8]) -> Result<IngestResponse, IngestError> {
        let config = self.shared.config();

        let (header, payload_offset) = RbmHeader::parse(data).inspect_err(|_| {
            self.shared.metrics.record_rejected();
        })?;

        if header.width != config.canvas.width || header.height != config.canvas.height {
            self.shared.metrics.record_rejected();
            return Err(IngestError::GeometryMismatch {
                width: header.width,
                height: header.height,
                canvas_w: config.canvas.width,
                canvas_h: config.canvas.height,
            });
        }

        let payload = &data[payload_offset..];
        if payload.len() != header.payload_len() {
            self.shared.metrics.record_rejected();
            return Err(IngestError::BadHeader(CodecError::PayloadLength {
                got: payload.len(),
                want: header.payload_len(),
                width: header.width,
                height: header.height,
            }));
        }

        self.registry.heartbeat(producer_id, header.seq);

        let is_active = self
            .shared
            .active_source()
            .is_some_and(|active| active == producer_id);
        if !is_active {
            trace!(producer_id, seq = header.seq, "observed non-active source");
            return Ok(self.response(IngestOutcome::Observed, header.seq, None));
        }

        self.shared.metrics.record_received();

        let payload_hash = fingerprint(payload);
        if self.registry.is_duplicate(producer_id, payload_hash) {
            self.shared.metrics.record_duplicate();
            return Ok(self.response(IngestOutcome::Duplicate, header.seq, None));
        }

        let retry_after_ms = {
            let mut bucket = self.shared.rate.lock().unwrap_or_else(|p| p.into_inner());
            let acquired = bucket.try_acquire();
            let retry_after_ms = bucket.retry_after_ms();
            if !acquired {
                self.shared.metrics.record_no_token();
                return Ok(self.response(IngestOutcome::NoToken, header.seq, retry_after_ms));
            }
            retry_after_ms
        };

        // The server's cadence is authoritative; the producer-declared
        // duration is overwritten before the frame reaches the dispatcher.
        let frame = RbmFrame {
            flags: header.flags,
            width: header.width,
            height: header.height,
            seq: header.seq,
            frame_duration_ms: config.runtime.interval_ms(),
            payload: payload.to_vec(),
        };

        let overflowed = self.shared.buffer.push(BufferEntry {
            frame,
            received_at: std::time::Instant::now(),
            producer_id: producer_id.to_string(),
        });
        self.shared.metrics.record_forwarded();
        if overflowed {
            debug!(producer_id, seq = header.seq, "buffer overflow, oldest dropped");
        }

        Ok(self.response(IngestOutcome::Queued, header.seq, retry_after_ms))
    }

    /// Apply a downstream back-off signal: advertise `retry_after_ms` and
    /// throttle refill for the window.
    pub fn apply_backoff(&self, window: Duration) {
        self.shared
            .rate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .penalize(window);
    }

    /// Current credit count, for adapters that poll it between frames.
    pub fn credits(&self) -> u32 {
        self.shared.credits()
    }

    fn response(
        &self,
        outcome: IngestOutcome,
        seq_ack: u32,
        retry_after_ms: Option<u64>,
    ) -> IngestResponse {
        IngestResponse {
            outcome,
            credits: self.shared.credits(),
            retry_after_ms,
            seq_ack,
        }
    }
}

/// Sanity bound used by adapters reading a framed request body.
pub const MAX_FRAME_BYTES: usize = HEADER_LEN + 64 * 1024;
