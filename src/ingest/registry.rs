//! Producer records: liveness, dedupe state and supervisor status, keyed
//! by producer id. Created on first observation, cleared on explicit stop.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerStatus {
    Running,
    Stopped,
    Restarting,
}

#[derive(Debug, Clone)]
pub struct ProducerRecord {
    pub id: String,
    pub last_heartbeat: Instant,
    pub status: ProducerStatus,
    pub restart_count: u32,
    pub last_error: Option<String>,
    /// Payload fingerprint of the last frame this producer submitted,
    /// used for duplicate suppression on the forward path.
    pub last_payload_hash: Option<u32>,
    pub last_seq: u32,
}

#[derive(Debug, Default)]
pub struct ProducerRegistry {
    inner: Mutex<HashMap<String, ProducerRecord>>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heartbeat, creating the record on first observation.
    pub fn heartbeat(&self, producer_id: &str, seq: u32) {
        self.heartbeat_at(producer_id, seq, Instant::now());
    }

    pub fn heartbeat_at(&self, producer_id: &str, seq: u32, now: Instant) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let record = inner
            .entry(producer_id.to_string())
            .or_insert_with(|| ProducerRecord {
                id: producer_id.to_string(),
                last_heartbeat: now,
                status: ProducerStatus::Running,
                restart_count: 0,
                last_error: None,
                last_payload_hash: None,
                last_seq: seq,
            });
        record.last_heartbeat = now;
        record.last_seq = seq;
    }

    /// Duplicate check against the producer's previous payload. Updates the
    /// stored fingerprint when the payload is new.
    pub fn is_duplicate(&self, producer_id: &str, payload_hash: u32) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let Some(record) = inner.get_mut(producer_id) else {
            return false;
        };
        if record.last_payload_hash == Some(payload_hash) {
            return true;
        }
        record.last_payload_hash = Some(payload_hash);
        false
    }

    pub fn get(&self, producer_id: &str) -> Option<ProducerRecord> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(producer_id)
            .cloned()
    }

    pub fn set_status(&self, producer_id: &str, status: ProducerStatus) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(record) = inner.get_mut(producer_id) {
            record.status = status;
        }
    }

    pub fn set_error(&self, producer_id: &str, error: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(record) = inner.get_mut(producer_id) {
            record.last_error = Some(error.into());
        }
    }

    pub fn bump_restart_count(&self, producer_id: &str) -> u32 {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match inner.get_mut(producer_id) {
            Some(record) => {
                record.restart_count += 1;
                record.restart_count
            }
            None => 0,
        }
    }

    /// Refresh the heartbeat without changing dedupe state, used when a
    /// worker is (re)started so it isn't immediately considered stale.
    pub fn touch(&self, producer_id: &str) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let record = inner
            .entry(producer_id.to_string())
            .or_insert_with(|| ProducerRecord {
                id: producer_id.to_string(),
                last_heartbeat: now,
                status: ProducerStatus::Running,
                restart_count: 0,
                last_error: None,
                last_payload_hash: None,
                last_seq: 0,
            });
        record.last_heartbeat = now;
    }

    /// Producers marked running whose heartbeat is older than `timeout`.
    pub fn stale_producers(&self, timeout: Duration, now: Instant) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .filter(|r| {
                r.status == ProducerStatus::Running
                    && now.saturating_duration_since(r.last_heartbeat) > timeout
            })
            .map(|r| r.id.clone())
            .collect()
    }

    /// Remove the record entirely (explicit stop).
    pub fn remove(&self, producer_id: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(producer_id);
    }

    pub fn snapshot(&self) -> Vec<ProducerRecord> {
        let mut records: Vec<ProducerRecord> = self
            .inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_heartbeat_creates_running_record() {
        let registry = ProducerRegistry::new();
        registry.heartbeat("worker-1", 7);

        let record = registry.get("worker-1").unwrap();
        assert_eq!(record.status, ProducerStatus::Running);
        assert_eq!(record.last_seq, 7);
        assert_eq!(record.restart_count, 0);
    }

    #[test]
    fn test_duplicate_detection_per_producer() {
        let registry = ProducerRegistry::new();
        registry.heartbeat("a", 0);
        registry.heartbeat("b", 0);

        assert!(!registry.is_duplicate("a", 0xDEAD));
        assert!(registry.is_duplicate("a", 0xDEAD));
        // other producer unaffected
        assert!(!registry.is_duplicate("b", 0xDEAD));
        // new payload resets
        assert!(!registry.is_duplicate("a", 0xBEEF));
        assert!(registry.is_duplicate("a", 0xBEEF));
    }

    #[test]
    fn test_stale_detection_only_for_running() {
        let registry = ProducerRegistry::new();
        let start = Instant::now();
        registry.heartbeat_at("fresh", 0, start);
        registry.heartbeat_at("stale", 0, start);
        registry.heartbeat_at("stopped", 0, start);
        registry.set_status("stopped", ProducerStatus::Stopped);

        let later = start + Duration::from_secs(15);
        registry.heartbeat_at("fresh", 1, later);

        let stale = registry.stale_producers(Duration::from_secs(10), later);
        assert_eq!(stale, vec!["stale".to_string()]);
    }

    #[test]
    fn test_remove_clears_record() {
        let registry = ProducerRegistry::new();
        registry.heartbeat("w", 0);
        registry.remove("w");
        assert!(registry.get("w").is_none());
    }
}
