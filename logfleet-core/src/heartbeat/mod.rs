//! Background liveness probing with fail-fast eviction.
//!
//! Each cycle snapshots the registry, probes every worker in parallel under
//! a per-probe timeout and removes every worker whose probe failed. There is
//! no retry: a worker that was only slow re-registers on its own.

mod prober;

use std::{fmt, sync::Arc, time::Duration};

use futures::future::join_all;
use logfleet_model::WorkerRegistration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::RegistryStore;

pub use prober::{HttpProber, Prober};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Alive,
    Dead(String),
    /// Cut short by shutdown. Says nothing about the worker.
    Aborted,
}

/// Result of one probe cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub probed: usize,
    pub alive: usize,
    pub aborted: usize,
    pub evicted: Vec<String>,
}

pub struct HeartbeatMonitor {
    registry: Arc<dyn RegistryStore>,
    prober: Arc<dyn Prober>,
    config: HeartbeatConfig,
}

impl fmt::Debug for HeartbeatMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartbeatMonitor")
            .field("prober", &self.prober)
            .field("config", &self.config)
            .finish()
    }
}

impl HeartbeatMonitor {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        prober: Arc<dyn Prober>,
        config: HeartbeatConfig,
    ) -> Self {
        Self {
            registry,
            prober,
            config,
        }
    }

    async fn probe_one(
        &self,
        worker: &WorkerRegistration,
        shutdown: &CancellationToken,
    ) -> ProbeOutcome {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => ProbeOutcome::Aborted,
            result = tokio::time::timeout(
                self.config.probe_timeout,
                self.prober.probe(&worker.url),
            ) => match result {
                Ok(Ok(())) => ProbeOutcome::Alive,
                Ok(Err(err)) => ProbeOutcome::Dead(err.to_string()),
                Err(_) => ProbeOutcome::Dead(format!(
                    "no response within {:?}",
                    self.config.probe_timeout
                )),
            },
        }
    }

    /// Probe every registered worker once and evict the dead ones.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> CycleReport {
        let workers = self.registry.list().await;
        let outcomes = join_all(
            workers
                .iter()
                .map(|worker| self.probe_one(worker, shutdown)),
        )
        .await;

        let mut report = CycleReport {
            probed: workers.len(),
            ..CycleReport::default()
        };

        for (worker, outcome) in workers.iter().zip(outcomes) {
            match outcome {
                ProbeOutcome::Alive => report.alive += 1,
                ProbeOutcome::Aborted => report.aborted += 1,
                ProbeOutcome::Dead(reason) => {
                    warn!(worker = %worker.url, name = %worker.name, %reason, "probe failed; evicting worker");
                    match self.registry.remove(&worker.url).await {
                        Ok(_) => report.evicted.push(worker.url.clone()),
                        Err(err) => {
                            warn!(worker = %worker.url, error = %err, "failed to evict worker")
                        }
                    }
                }
            }
        }

        debug!(
            probed = report.probed,
            alive = report.alive,
            evicted = report.evicted.len(),
            aborted = report.aborted,
            "heartbeat cycle complete"
        );
        report
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Heartbeat monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle(&shutdown).await;
                }
            }
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
