use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use logfleet_core::{
    heartbeat::{HeartbeatConfig, HeartbeatMonitor, HttpProber},
    registry::StoreHealthMonitor,
    replication::Backoff,
};

use crate::infra::{
    app_state::{ControlPlaneState, WorkerState},
    tasks::BackgroundTasks,
    websocket::{LinkSettings, ReplicationLink},
};

/// Background work started once the state is wired and before the
/// listener accepts traffic.
#[async_trait]
pub trait StartupHooks: Send + Sync {
    async fn control_plane(
        &self,
        state: &ControlPlaneState,
        tasks: &mut BackgroundTasks,
    ) -> Result<()>;

    async fn worker(
        &self,
        state: &WorkerState,
        tasks: &mut BackgroundTasks,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct ProdStartupHooks;

#[async_trait]
impl StartupHooks for ProdStartupHooks {
    async fn control_plane(
        &self,
        state: &ControlPlaneState,
        tasks: &mut BackgroundTasks,
    ) -> Result<()> {
        let heartbeat = HeartbeatConfig {
            interval: state.config.heartbeat.interval,
            probe_timeout: state.config.heartbeat.probe_timeout,
        };
        let prober = HttpProber::new(heartbeat.probe_timeout)
            .context("failed to build heartbeat http client")?;
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&state.registry),
            Arc::new(prober),
            heartbeat,
        );
        tasks.track("heartbeat", monitor.spawn(tasks.token()));

        let store_health = StoreHealthMonitor::new(
            Arc::clone(&state.registry),
            state.config.store_health.interval,
        );
        tasks.track("store-health", store_health.spawn(tasks.token()));

        if state.hub.is_distributed() {
            let replication = &state.config.replication;
            let backoff =
                Backoff::new(replication.initial_backoff, replication.max_backoff);
            tasks.track(
                "backplane-listener",
                state.hub.spawn_backplane_listener(tasks.token(), backoff),
            );
        } else {
            info!("replication fanout limited to this instance");
        }

        Ok(())
    }

    async fn worker(
        &self,
        state: &WorkerState,
        tasks: &mut BackgroundTasks,
    ) -> Result<()> {
        tasks.track("registration-agent", state.agent.spawn(tasks.token()));

        match ReplicationLink::new(
            &state.control_plane_url,
            Arc::clone(&state.bus),
            LinkSettings::from(&state.config.replication),
        ) {
            Ok(link) => {
                info!(endpoint = link.endpoint(), "starting replication link");
                tasks.track("replication-link", link.spawn(tasks.token()));
            }
            Err(err) => {
                warn!(error = %err, "replication link disabled; events stay local");
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoopStartupHooks;

#[async_trait]
impl StartupHooks for NoopStartupHooks {
    async fn control_plane(
        &self,
        _state: &ControlPlaneState,
        _tasks: &mut BackgroundTasks,
    ) -> Result<()> {
        Ok(())
    }

    async fn worker(
        &self,
        _state: &WorkerState,
        _tasks: &mut BackgroundTasks,
    ) -> Result<()> {
        Ok(())
    }
}
