//! Bounded keep-latest frame queue between the forwarder and the
//! dispatcher. Single producer, single consumer; when full, the oldest
//! entry is dropped so the freshest frames win.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::protocol::RbmFrame;

/// A queued frame with its provenance.
#[derive(Debug, Clone)]
pub struct BufferEntry {
    pub frame: RbmFrame,
    pub received_at: Instant,
    pub producer_id: String,
}

/// Counters exposed to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub received: u64,
    pub dropped_overflow: u64,
    pub popped: u64,
    pub occupancy: usize,
    pub capacity: usize,
    /// Highest occupancy observed since the last status read.
    pub high_water: usize,
}

pub struct KeepLatestBuffer {
    inner: Mutex<Inner>,
    occupancy: AtomicUsize,
    received: AtomicU64,
    dropped_overflow: AtomicU64,
    popped: AtomicU64,
}

struct Inner {
    queue: VecDeque<BufferEntry>,
    capacity: usize,
    high_water: usize,
}

impl KeepLatestBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity.max(1)),
                capacity: capacity.max(1),
                high_water: 0,
            }),
            occupancy: AtomicUsize::new(0),
            received: AtomicU64::new(0),
            dropped_overflow: AtomicU64::new(0),
            popped: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame. When the buffer is full the oldest entry is
    /// dropped, not the new one. Returns true if an overflow drop occurred.
    pub fn push(&self, entry: BufferEntry) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());

        let mut overflowed = false;
        if inner.queue.len() >= inner.capacity {
            inner.queue.pop_front();
            self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
            overflowed = true;
        }
        inner.queue.push_back(entry);
        self.received.fetch_add(1, Ordering::Relaxed);

        let len = inner.queue.len();
        if len > inner.high_water {
            inner.high_water = len;
        }
        self.occupancy.store(len, Ordering::Relaxed);
        overflowed
    }

    /// Dequeue the oldest frame, or None immediately if empty.
    pub fn pop(&self) -> Option<BufferEntry> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let entry = inner.queue.pop_front()?;
        self.popped.fetch_add(1, Ordering::Relaxed);
        self.occupancy.store(inner.queue.len(), Ordering::Relaxed);
        Some(entry)
    }

    /// Current number of queued frames, readable without the lock.
    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).capacity
    }

    /// Resize the buffer, keeping the newest entries when shrinking.
    pub fn resize(&self, capacity: usize) {
        let capacity = capacity.max(1);
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        while inner.queue.len() > capacity {
            inner.queue.pop_front();
            self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
        }
        inner.capacity = capacity;
        self.occupancy.store(inner.queue.len(), Ordering::Relaxed);
    }

    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let cleared = inner.queue.len();
        inner.queue.clear();
        self.occupancy.store(0, Ordering::Relaxed);
        cleared
    }

    /// Snapshot the counters. Resets the high-water mark, so each status
    /// read reports the peak since the previous one.
    pub fn stats(&self) -> BufferStats {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let stats = BufferStats {
            received: self.received.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            occupancy: inner.queue.len(),
            capacity: inner.capacity,
            high_water: inner.high_water,
        };
        inner.high_water = inner.queue.len();
        stats
    }
}
