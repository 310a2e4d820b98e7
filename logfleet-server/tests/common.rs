use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use axum::Router;
use axum_test::TestServer;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use logfleet_config::Config;
use logfleet_server::{
    ControlPlaneState, WorkerState,
    app::{build_control_plane_state, build_worker_state},
    routes::{create_control_plane_router, create_worker_router},
};

// Code is used by test modules, but not in this scope
#[allow(unused)]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.registration.auto_register = false;
    config.registration.ip_address = Some("127.0.0.1".to_string());
    config.registration.startup_delay = Duration::ZERO;
    config.registration.request_timeout = Duration::from_secs(2);
    config.replication.initial_backoff = Duration::from_millis(50);
    config.replication.max_backoff = Duration::from_millis(200);
    config.replication.connect_timeout = Duration::from_secs(2);
    config
}

#[allow(unused)]
pub async fn control_plane_state(shutdown: CancellationToken) -> Result<ControlPlaneState> {
    build_control_plane_state(Arc::new(test_config()), shutdown).await
}

#[allow(unused)]
pub async fn worker_state(
    name: &str,
    url: &str,
    control_plane_url: &str,
    shutdown: CancellationToken,
) -> Result<WorkerState> {
    let mut config = test_config();
    config.registration.name = name.to_string();
    config.registration.url = Some(url.to_string());
    config.registration.control_plane_url = Some(control_plane_url.to_string());
    build_worker_state(Arc::new(config), shutdown).await
}

#[allow(unused)]
pub async fn control_plane_server() -> Result<(TestServer, ControlPlaneState)> {
    let state = control_plane_state(CancellationToken::new()).await?;
    let server = TestServer::new(create_control_plane_router(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;
    Ok((server, state))
}

#[allow(unused)]
pub async fn worker_server(name: &str) -> Result<(TestServer, WorkerState)> {
    let state = worker_state(
        name,
        &format!("http://127.0.0.1:1/{name}"),
        "http://127.0.0.1:1",
        CancellationToken::new(),
    )
    .await?;
    let server = TestServer::new(create_worker_router(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;
    Ok((server, state))
}

/// Ephemeral localhost listener.
#[allow(unused)]
pub async fn bind() -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

/// Serve `router` until `shutdown`.
#[allow(unused)]
pub fn serve(listener: TcpListener, router: Router, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
    });
}

/// Poll `check` for up to five seconds.
#[allow(unused)]
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
