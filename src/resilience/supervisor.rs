//! Worker supervisor: watches producer heartbeats and restarts local
//! producer tasks that go silent, with exponential backoff and a restart
//! budget.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::engine::{EngineEvent, EngineShared};
use crate::ingest::{ProducerRegistry, ProducerStatus};

use super::SupervisorPolicy;

/// A locally supervised producer task.
#[async_trait]
pub trait Worker: Send {
    fn id(&self) -> &str;

    /// Begin producing frames.
    async fn start(&mut self) -> Result<()>;

    /// Stop producing, returning once the task has wound down.
    async fn stop(&mut self) -> Result<()>;

    /// Forced termination when `stop` exceeds its command timeout.
    fn abort(&mut self) {}
}

pub struct Supervisor {
    shared: Arc<EngineShared>,
    registry: Arc<ProducerRegistry>,
    policy: SupervisorPolicy,
    workers: HashMap<String, Box<dyn Worker>>,
    restart_history: HashMap<String, VecDeque<Instant>>,
}

impl Supervisor {
    pub fn new(
        shared: Arc<EngineShared>,
        registry: Arc<ProducerRegistry>,
        policy: SupervisorPolicy,
    ) -> Self {
        Self {
            shared,
            registry,
            policy,
            workers: HashMap::new(),
            restart_history: HashMap::new(),
        }
    }

    /// Hand a worker to the supervisor. Started when the supervisor runs.
    pub fn register(&mut self, worker: Box<dyn Worker>) {
        self.workers.insert(worker.id().to_string(), worker);
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Start all workers, then sweep for stale heartbeats until shutdown.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let ids: Vec<String> = self.workers.keys().cloned().collect();
        for id in ids {
            self.start_worker(&id).await;
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.policy.scan_interval) => {}
            }
            self.sweep().await;
        }

        let ids: Vec<String> = self.workers.keys().cloned().collect();
        for id in ids {
            self.stop_worker(&id).await;
            self.registry.set_status(&id, ProducerStatus::Stopped);
        }
        Ok(())
    }

    /// One supervision pass: restart every worker whose heartbeat expired,
    /// and retry workers stuck in `Restarting` from a failed start.
    pub async fn sweep(&mut self) {
        let now = Instant::now();
        let mut candidates = self
            .registry
            .stale_producers(self.policy.heartbeat_timeout, now);
        for record in self.registry.snapshot() {
            if record.status == ProducerStatus::Restarting && !candidates.contains(&record.id) {
                candidates.push(record.id);
            }
        }

        for id in candidates {
            if !self.workers.contains_key(&id) {
                // remote producer; liveness is observed but not supervised
                continue;
            }
            self.restart_worker(&id).await;
        }
    }

    async fn restart_worker(&mut self, id: &str) {
        if self.budget_exhausted(id) {
            warn!(worker = id, "restart budget exhausted, stopping worker");
            self.stop_worker(id).await;
            self.registry.set_status(id, ProducerStatus::Stopped);
            self.registry.set_error(id, "exceeded restart budget");
            return;
        }

        self.registry.set_status(id, ProducerStatus::Restarting);
        let restart_count = self.registry.bump_restart_count(id);
        self.restart_history
            .entry(id.to_string())
            .or_default()
            .push_back(Instant::now());

        let backoff = self.policy.backoff_for(restart_count);
        info!(worker = id, restart_count, ?backoff, "restarting worker");

        self.stop_worker(id).await;
        tokio::time::sleep(backoff).await;
        self.start_worker(id).await;
    }

    fn budget_exhausted(&mut self, id: &str) -> bool {
        let now = Instant::now();
        let history = self.restart_history.entry(id.to_string()).or_default();
        while history
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) > self.policy.budget_window)
        {
            history.pop_front();
        }
        history.len() as u32 >= self.policy.restart_budget
    }

    async fn start_worker(&mut self, id: &str) {
        let Some(worker) = self.workers.get_mut(id) else {
            return;
        };

        match tokio::time::timeout(self.policy.command_timeout, worker.start()).await {
            Ok(Ok(())) => {
                self.registry.touch(id);
                self.registry.set_status(id, ProducerStatus::Running);
                self.shared.emit(EngineEvent::WorkerStarted(id.to_string()));
                info!(worker = id, "worker started");
            }
            Ok(Err(e)) => {
                warn!(worker = id, error = %e, "worker start failed");
                self.registry.set_status(id, ProducerStatus::Restarting);
                self.registry.set_error(id, e.to_string());
            }
            Err(_) => {
                warn!(worker = id, "worker start timed out, aborting");
                worker.abort();
                self.registry.set_status(id, ProducerStatus::Restarting);
                self.registry.set_error(id, "start timed out");
            }
        }
    }

    async fn stop_worker(&mut self, id: &str) {
        let Some(worker) = self.workers.get_mut(id) else {
            return;
        };

        match tokio::time::timeout(self.policy.command_timeout, worker.stop()).await {
            Ok(Ok(())) => {
                self.shared.emit(EngineEvent::WorkerStopped(id.to_string()));
            }
            Ok(Err(e)) => {
                warn!(worker = id, error = %e, "worker stop failed, aborting");
                worker.abort();
                self.shared.emit(EngineEvent::WorkerStopped(id.to_string()));
            }
            Err(_) => {
                warn!(worker = id, "worker stop timed out, aborting");
                worker.abort();
                self.shared.emit(EngineEvent::WorkerStopped(id.to_string()));
            }
        }
    }
}
