use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Long-running tasks tied to one shutdown token.
#[derive(Debug)]
pub struct BackgroundTasks {
    shutdown: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn track(&mut self, name: &'static str, handle: JoinHandle<()>) {
        info!(task = name, "background task started");
        self.handles.push((name, handle));
    }

    /// Cancel and wait for every task, giving each up to `grace`.
    pub async fn shutdown(self, grace: Duration) {
        self.shutdown.cancel();

        for (name, handle) in self.handles {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(task = name, "background task failed: {:?}", e),
                Err(_) => warn!(task = name, "background task timed out during shutdown"),
            }
        }

        info!("background tasks stopped");
    }
}
