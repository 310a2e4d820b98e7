use std::{fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

use logfleet_config::Config;
use logfleet_core::{
    agent::SelfRegistrationAgent, dispatch::DispatchCounter,
    registry::RegistryStore, replication::{ReplicationBus, ReplicationHub},
};

/// Shared state of the control-plane process.
#[derive(Clone)]
pub struct ControlPlaneState {
    pub config: Arc<Config>,
    pub registry: Arc<dyn RegistryStore>,
    pub dispatch: Arc<DispatchCounter>,
    pub hub: Arc<ReplicationHub>,
    /// Client used to forward reads to workers.
    pub http: reqwest::Client,
    pub shutdown: CancellationToken,
}

impl fmt::Debug for ControlPlaneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlaneState")
            .field("registry", &self.registry)
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

/// Shared state of a worker process.
#[derive(Clone)]
pub struct WorkerState {
    pub config: Arc<Config>,
    pub bus: Arc<ReplicationBus>,
    pub agent: Arc<SelfRegistrationAgent>,
    /// Resolved control-plane url shared by the agent and the replication link.
    pub control_plane_url: String,
    pub shutdown: CancellationToken,
}

impl fmt::Debug for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerState")
            .field("bus", &self.bus)
            .field("agent", &self.agent)
            .field("control_plane_url", &self.control_plane_url)
            .finish_non_exhaustive()
    }
}
