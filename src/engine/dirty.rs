//! Per-panel write suppression.
//!
//! Hardware updates whole panels, so dirtiness is tracked at panel grain: a
//! 32-bit fingerprint of the last payload actually written per panel id. A
//! panel is rewritten only when its new payload hashes differently.

use std::collections::HashMap;

/// Fingerprint a panel payload.
pub fn fingerprint(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

#[derive(Debug, Default)]
pub struct PanelCache {
    written: HashMap<String, u32>,
}

impl PanelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Does this payload differ from what the panel last showed?
    /// Unknown panels are always dirty.
    pub fn is_dirty(&self, panel_id: &str, hash: u32) -> bool {
        self.written.get(panel_id) != Some(&hash)
    }

    /// Record a successful write.
    pub fn commit(&mut self, panel_id: &str, hash: u32) {
        self.written.insert(panel_id.to_string(), hash);
    }

    /// Forget one panel after a failed write, so the next success always
    /// rewrites it.
    pub fn invalidate(&mut self, panel_id: &str) {
        self.written.remove(panel_id);
    }

    /// Forget everything. Invoked on transport reset and on topology
    /// publication.
    pub fn force_all(&mut self) {
        self.written.clear();
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}
