use std::{sync::Arc, time::Duration};

use anyhow::Result;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use logfleet_core::heartbeat::{HeartbeatConfig, HeartbeatMonitor, HttpProber};
use logfleet_model::{LogEvent, WorkerRegistration, routes::v1};
use logfleet_server::{
    ControlPlaneState, WorkerState,
    infra::websocket::{LinkSettings, ReplicationLink},
    routes::{create_control_plane_router, create_worker_router},
};

mod common;
use common::{bind, control_plane_state, serve, test_config, wait_until, worker_state};

fn link_settings() -> LinkSettings {
    LinkSettings::from(&test_config().replication)
}

async fn start_control_plane(shutdown: &CancellationToken) -> Result<(ControlPlaneState, String)> {
    let (listener, addr) = bind().await?;
    let state = control_plane_state(shutdown.clone()).await?;
    serve(listener, create_control_plane_router(state.clone()), shutdown.clone());
    Ok((state, format!("http://{addr}")))
}

async fn start_linked_worker(
    name: &str,
    control_plane_url: &str,
    shutdown: &CancellationToken,
) -> Result<WorkerState> {
    let worker = worker_state(
        name,
        &format!("http://127.0.0.1:1/{name}"),
        control_plane_url,
        shutdown.clone(),
    )
    .await?;
    ReplicationLink::new(control_plane_url, Arc::clone(&worker.bus), link_settings())?
        .spawn(shutdown.clone());
    Ok(worker)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_event_reaches_peers_exactly_once() -> Result<()> {
    let shutdown = CancellationToken::new();
    let (control_plane, cp_url) = start_control_plane(&shutdown).await?;
    let x = start_linked_worker("x", &cp_url, &shutdown).await?;
    let y = start_linked_worker("y", &cp_url, &shutdown).await?;
    let z = start_linked_worker("z", &cp_url, &shutdown).await?;

    let hub = &control_plane.hub;
    assert!(wait_until(move || async move { hub.subscriber_count() == 3 }).await);
    // The hub registers a socket slightly after the worker side is live.
    tokio::time::sleep(Duration::from_millis(100)).await;

    x.bus.replicate(LogEvent::new("x", "checkout"))?;

    let (y_bus, z_bus) = (&y.bus, &z.bus);
    assert!(
        wait_until(move || async move {
            y_bus.store().len() == 1 && z_bus.store().len() == 1
        })
        .await
    );

    // Give any echo time to show up.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(x.bus.store().len(), 1);
    assert_eq!(y.bus.store().len(), 1);
    assert_eq!(z.bus.store().len(), 1);
    assert_eq!(y.bus.watermark(x.bus.origin()), Some(1));

    let stored = y.bus.store().all_entries();
    let event = stored.values().next().expect("replicated event");
    assert_eq!(event.name, "checkout");
    assert_eq!(event.source_instance, "x");

    shutdown.cancel();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn control_plane_ingest_reaches_every_worker() -> Result<()> {
    let shutdown = CancellationToken::new();
    let (control_plane, cp_url) = start_control_plane(&shutdown).await?;
    let x = start_linked_worker("x", &cp_url, &shutdown).await?;
    let y = start_linked_worker("y", &cp_url, &shutdown).await?;

    let hub = &control_plane.hub;
    assert!(wait_until(move || async move { hub.subscriber_count() == 2 }).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{cp_url}{}", v1::logs::COLLECTION))
        .json(&json!({ "sourceInstance": "client", "name": "signup" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["delivered"], 2);

    let (x_bus, y_bus) = (&x.bus, &y.bus);
    assert!(
        wait_until(move || async move {
            x_bus.store().len() == 1 && y_bus.store().len() == 1
        })
        .await
    );

    shutdown.cancel();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn link_connects_once_control_plane_comes_up() -> Result<()> {
    let shutdown = CancellationToken::new();

    // Reserve a port, then leave it closed so the first attempts fail.
    let (listener, addr) = bind().await?;
    drop(listener);
    let cp_url = format!("http://{addr}");
    let x = start_linked_worker("x", &cp_url, &shutdown).await?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let stored_locally = x.bus.replicate(LogEvent::new("x", "offline"))?;
    assert_eq!(stored_locally.links, 0);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let control_plane = control_plane_state(shutdown.clone()).await?;
    serve(listener, create_control_plane_router(control_plane.clone()), shutdown.clone());

    let hub = &control_plane.hub;
    assert!(wait_until(move || async move { hub.subscriber_count() == 1 }).await);
    assert_eq!(x.bus.store().len(), 1);

    shutdown.cancel();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn agent_registers_and_unregisters_with_a_live_control_plane() -> Result<()> {
    let cp_shutdown = CancellationToken::new();
    let (control_plane, cp_url) = start_control_plane(&cp_shutdown).await?;

    let worker_shutdown = CancellationToken::new();
    let mut config = test_config();
    config.registration.name = "worker-a".to_string();
    config.registration.url = Some("http://127.0.0.1:1".to_string());
    config.registration.control_plane_url = Some(cp_url.clone());
    config.registration.auto_register = true;
    let worker = logfleet_server::app::build_worker_state(
        Arc::new(config),
        worker_shutdown.clone(),
    )
    .await?;

    let agent = worker.agent.spawn(worker_shutdown.clone());
    let (registry, worker_agent) = (&control_plane.registry, &worker.agent);
    assert!(
        wait_until(move || async move {
            registry.count().await == 1 && worker_agent.status().is_registered
        })
        .await
    );

    worker_shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), agent).await??;
    assert_eq!(control_plane.registry.count().await, 0);

    cp_shutdown.cancel();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn heartbeat_evicts_unreachable_workers_only() -> Result<()> {
    let shutdown = CancellationToken::new();
    let control_plane = control_plane_state(shutdown.clone()).await?;

    let (listener, addr) = bind().await?;
    let live_url = format!("http://{addr}");
    let live = worker_state("live", &live_url, "http://127.0.0.1:1", shutdown.clone()).await?;
    serve(listener, create_worker_router(live), shutdown.clone());

    let (dead_listener, dead_addr) = bind().await?;
    drop(dead_listener);

    control_plane
        .registry
        .upsert(WorkerRegistration::new("live", live_url.clone(), "127.0.0.1"))
        .await?;
    control_plane
        .registry
        .upsert(WorkerRegistration::new("dead", format!("http://{dead_addr}"), "127.0.0.1"))
        .await?;

    let config = HeartbeatConfig {
        interval: Duration::from_secs(10),
        probe_timeout: Duration::from_secs(1),
    };
    let monitor = HeartbeatMonitor::new(
        Arc::clone(&control_plane.registry),
        Arc::new(HttpProber::new(config.probe_timeout)?),
        config,
    );
    let report = monitor.run_cycle(&shutdown).await;

    assert_eq!(report.probed, 2);
    assert_eq!(report.alive, 1);
    assert_eq!(report.evicted, vec![format!("http://{dead_addr}")]);
    let remaining = control_plane.registry.list().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].url, live_url);

    shutdown.cancel();
    Ok(())
}
