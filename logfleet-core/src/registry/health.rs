use std::{fmt, sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::RegistryStore;

/// Periodically reports how many workers the shared store holds.
pub struct StoreHealthMonitor {
    registry: Arc<dyn RegistryStore>,
    interval: Duration,
}

impl fmt::Debug for StoreHealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHealthMonitor")
            .field("interval", &self.interval)
            .finish()
    }
}

impl StoreHealthMonitor {
    pub fn new(registry: Arc<dyn RegistryStore>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// One check. `None` means the store could not be read.
    pub async fn check(&self) -> Option<usize> {
        match self.registry.try_count().await {
            Ok(count) => {
                info!(workers = count, "registry store reachable");
                Some(count)
            }
            Err(err) => {
                warn!(error = %err, "registry store health check failed");
                None
            }
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Store health monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
