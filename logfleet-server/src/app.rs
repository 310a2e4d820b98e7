//! Process wiring for both roles: build state, start background tasks,
//! serve until ctrl-c, then drain.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use logfleet_config::{Config, ConfigWarnings, ServerConfig};
use logfleet_core::{
    agent::{AgentConfig, SelfRegistrationAgent},
    dispatch::{CursorStore, DispatchCounter, InMemoryCursor, RedisCursorStore},
    logs::LogStore,
    registry::{InMemoryRegistry, RedisRegistryStore, RegistryStore},
    replication::{ReplicationBus, ReplicationHub, connect_backplane},
};
use logfleet_model::OriginId;

use crate::{
    infra::{
        app_state::{ControlPlaneState, WorkerState},
        startup::{ProdStartupHooks, StartupHooks},
        tasks::BackgroundTasks,
    },
    routes::{create_control_plane_router, create_worker_router},
};

/// How long background tasks get to finish once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

fn in_memory_stores() -> (Arc<dyn RegistryStore>, Arc<dyn CursorStore>) {
    (
        Arc::new(InMemoryRegistry::spawn()),
        Arc::new(InMemoryCursor::default()),
    )
}

async fn connect_stores(config: &Config) -> (Arc<dyn RegistryStore>, Arc<dyn CursorStore>) {
    let Some(redis) = config.redis.as_ref() else {
        info!("registry and dispatch cursor kept in process memory");
        return in_memory_stores();
    };

    match RedisRegistryStore::connect(&redis.url).await {
        Ok(store) => {
            info!("registry and dispatch cursor shared through redis");
            let cursor = RedisCursorStore::new(store.connection());
            (Arc::new(store), Arc::new(cursor))
        }
        Err(err) => {
            warn!(error = %err, "redis unavailable; registry and dispatch cursor kept in process memory");
            in_memory_stores()
        }
    }
}

pub async fn build_control_plane_state(
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> anyhow::Result<ControlPlaneState> {
    let (registry, cursor) = connect_stores(&config).await;
    let dispatch = Arc::new(DispatchCounter::new(Arc::clone(&registry), cursor));

    let backplane = connect_backplane(
        config.redis.as_ref().map(|redis| redis.url.as_str()),
        &config.replication.channel,
    )
    .await;
    let node = format!("control-plane@{}:{}", config.server.host, config.server.port);
    let hub = Arc::new(ReplicationHub::new(node, backplane));

    let http = reqwest::Client::builder()
        .timeout(config.registration.request_timeout)
        .build()
        .context("failed to build proxy http client")?;

    Ok(ControlPlaneState {
        config,
        registry,
        dispatch,
        hub,
        http,
        shutdown,
    })
}

pub async fn build_worker_state(
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> anyhow::Result<WorkerState> {
    let mut warnings = ConfigWarnings::default();
    let control_plane_url = config.control_plane_url_or_default(&mut warnings);
    for warning in &warnings.items {
        warn!("{warning}");
    }

    let registration = &config.registration;
    let agent_config = AgentConfig {
        control_plane_url: Some(control_plane_url.clone()),
        name: registration.name.clone(),
        port: registration.port,
        ip_address: registration.ip_address.clone(),
        url: registration.url.clone(),
        auto_register: registration.auto_register,
        startup_delay: registration.startup_delay,
        request_timeout: registration.request_timeout,
    };

    // Address discovery may resolve the hostname.
    let agent = tokio::task::spawn_blocking(move || SelfRegistrationAgent::new(agent_config))
        .await
        .context("registration agent setup panicked")?
        .context("failed to build registration agent")?;
    let agent = Arc::new(agent);

    let origin = OriginId::new(agent.registration().url.clone());
    info!(
        worker = %agent.registration().name,
        url = %agent.registration().url,
        incarnation = %origin.incarnation,
        "worker identity resolved"
    );
    let bus = Arc::new(ReplicationBus::new(origin, LogStore::default()));

    Ok(WorkerState {
        config,
        bus,
        agent,
        control_plane_url,
        shutdown,
    })
}

async fn serve(
    router: Router,
    server: &ServerConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", listener.local_addr()?);

    let signal = shutdown.clone();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(err) => warn!(error = %err, "failed to listen for ctrl-c; shutting down"),
            },
            _ = signal.cancelled() => {}
        }
        signal.cancel();
    })
    .await?;

    Ok(())
}

pub async fn run_control_plane(config: Arc<Config>) -> anyhow::Result<()> {
    run_control_plane_with_hooks(config, &ProdStartupHooks, CancellationToken::new()).await
}

/// Serve the control plane until ctrl-c or `shutdown`, then drain its
/// background tasks.
pub async fn run_control_plane_with_hooks<H>(
    config: Arc<Config>,
    hooks: &H,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    H: StartupHooks,
{
    let state = build_control_plane_state(Arc::clone(&config), shutdown.clone()).await?;

    let mut tasks = BackgroundTasks::new(shutdown.clone());
    hooks.control_plane(&state, &mut tasks).await?;

    info!(
        "Starting logfleet control plane on {}:{}",
        config.server.host, config.server.port
    );
    let result = serve(create_control_plane_router(state), &config.server, shutdown).await;
    tasks.shutdown(SHUTDOWN_GRACE).await;
    result
}

pub async fn run_worker(config: Arc<Config>) -> anyhow::Result<()> {
    run_worker_with_hooks(config, &ProdStartupHooks, CancellationToken::new()).await
}

pub async fn run_worker_with_hooks<H>(
    config: Arc<Config>,
    hooks: &H,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    H: StartupHooks,
{
    let state = build_worker_state(Arc::clone(&config), shutdown.clone()).await?;

    let mut tasks = BackgroundTasks::new(shutdown.clone());
    hooks.worker(&state, &mut tasks).await?;

    info!(
        "Starting logfleet worker {} on {}:{}",
        state.agent.registration().name,
        config.server.host,
        config.server.port
    );
    let result = serve(create_worker_router(state), &config.server, shutdown).await;
    tasks.shutdown(SHUTDOWN_GRACE).await;
    result
}
