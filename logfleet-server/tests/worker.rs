use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{Value, json};

use logfleet_model::{LogPagesResponse, RegistrationStatus, routes::v1};

mod common;
use common::worker_server;

#[tokio::test]
async fn submitted_logs_come_back_oldest_first() -> Result<()> {
    let (server, state) = worker_server("worker-a").await?;

    for (name, timestamp) in [
        ("third", "2024-05-01T12:00:03Z"),
        ("first", "2024-05-01T12:00:01Z"),
        ("second", "2024-05-01T12:00:02Z"),
    ] {
        let body: Value = server
            .post(v1::logs::COLLECTION)
            .json(&json!({
                "sourceInstance": "client",
                "name": name,
                "timestamp": timestamp
            }))
            .await
            .json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["replicated"], false);
    }
    assert_eq!(state.bus.store().len(), 3);

    let pages: LogPagesResponse = server
        .get(v1::logs::COLLECTION)
        .add_query_param("pageSize", 2)
        .await
        .json();
    assert_eq!(pages.schema_version, 1);
    let names: Vec<Vec<&str>> = pages
        .pages
        .iter()
        .map(|page| page.iter().map(|event| event.name.as_str()).collect())
        .collect();
    assert_eq!(names, vec![vec!["first", "second"], vec!["third"]]);
    Ok(())
}

#[tokio::test]
async fn default_page_size_is_ten() -> Result<()> {
    let (server, _state) = worker_server("worker-a").await?;
    for i in 0..11 {
        server
            .post(v1::logs::COLLECTION)
            .json(&json!({ "name": format!("event-{i}") }))
            .await
            .assert_status_ok();
    }

    let pages: LogPagesResponse = server.get(v1::logs::COLLECTION).await.json();
    let sizes: Vec<usize> = pages.pages.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![10, 1]);
    // Missing source is filled with the worker name.
    assert!(pages.pages[0].iter().all(|event| event.source_instance == "worker-a"));
    Ok(())
}

#[tokio::test]
async fn bad_requests_are_rejected() -> Result<()> {
    let (server, state) = worker_server("worker-a").await?;

    server
        .get(v1::logs::COLLECTION)
        .add_query_param("pageSize", 0)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post(v1::logs::COLLECTION)
        .json(&json!({ "name": " " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert!(state.bus.store().is_empty());
    Ok(())
}

#[tokio::test]
async fn registration_status_and_health() -> Result<()> {
    let (server, _state) = worker_server("worker-a").await?;

    let status: RegistrationStatus = server.get(v1::agent::STATUS).await.json();
    assert!(!status.is_registered);
    assert_eq!(status.name, "worker-a");
    assert_eq!(status.url, "http://127.0.0.1:1/worker-a");
    assert_eq!(status.ip_address, "127.0.0.1");
    assert_eq!(status.control_plane_url.as_deref(), Some("http://127.0.0.1:1"));
    assert!(status.last_registration.is_none());

    let health: Value = server.get("/health").await.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["role"], "worker");
    Ok(())
}
