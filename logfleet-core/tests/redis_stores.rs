//! Run with `LOGFLEET_TEST_REDIS_URL=redis://127.0.0.1:6379`. Skipped
//! otherwise.

use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use logfleet_core::{
    dispatch::{CursorStore, DispatchCounter, RedisCursorStore},
    registry::{RedisRegistryStore, RegistryStore, UpsertOutcome},
};
use logfleet_model::WorkerRegistration;

async fn connection() -> Result<Option<ConnectionManager>> {
    let Ok(url) = std::env::var("LOGFLEET_TEST_REDIS_URL") else {
        eprintln!("LOGFLEET_TEST_REDIS_URL not set; skipping");
        return Ok(None);
    };
    let client = redis::Client::open(url)?;
    Ok(Some(ConnectionManager::new(client).await?))
}

fn scratch_key(prefix: &str) -> String {
    format!("logfleet:test:{prefix}:{}", Uuid::new_v4())
}

async fn cleanup(conn: &mut ConnectionManager, key: &str) -> Result<()> {
    let _: () = redis::cmd("DEL").arg(key).query_async(conn).await?;
    Ok(())
}

fn worker(name: &str, url: &str) -> WorkerRegistration {
    WorkerRegistration::new(name, url, "10.0.0.1")
}

#[tokio::test]
async fn registry_upsert_and_remove_keep_order() -> Result<()> {
    let Some(mut conn) = connection().await? else {
        return Ok(());
    };
    let key = scratch_key("registry");
    let store = RedisRegistryStore::with_connection(conn.clone(), key.clone());

    assert!(store.try_list().await?.is_empty());
    assert_eq!(store.upsert(worker("a", "http://a:1")).await?, UpsertOutcome::Inserted);
    assert_eq!(store.upsert(worker("b", "http://b:1")).await?, UpsertOutcome::Inserted);
    assert_eq!(store.upsert(worker("c", "http://c:1")).await?, UpsertOutcome::Inserted);
    assert_eq!(
        store.upsert(worker("b", "http://b:2")).await?,
        UpsertOutcome::Replaced(1)
    );

    let names: Vec<String> = store.try_list().await?.into_iter().map(|w| w.name).collect();
    assert_eq!(names, ["a", "b", "c"]);

    let removed = store.remove("http://b:2").await?;
    assert_eq!(removed.map(|w| w.name).as_deref(), Some("b"));
    assert!(store.remove("ghost").await?.is_none());

    let names: Vec<String> = store.try_list().await?.into_iter().map(|w| w.name).collect();
    assert_eq!(names, ["a", "c"]);

    store.remove("a").await?;
    store.remove("c").await?;
    assert_eq!(store.try_count().await?, 0);

    cleanup(&mut conn, &key).await
}

#[tokio::test]
async fn concurrent_upserts_never_duplicate() -> Result<()> {
    let Some(mut conn) = connection().await? else {
        return Ok(());
    };
    let key = scratch_key("registry");
    let store = Arc::new(RedisRegistryStore::with_connection(conn.clone(), key.clone()));

    let writes = (0..40).map(|i| {
        let store = Arc::clone(&store);
        async move {
            let name = format!("w{}", i % 8);
            store
                .upsert(worker(&name, &format!("http://{name}:{i}")))
                .await
        }
    });
    for result in join_all(writes).await {
        result?;
    }

    assert_eq!(store.try_count().await?, 8);
    cleanup(&mut conn, &key).await
}

#[tokio::test]
async fn shared_cursor_round_robins_across_counters() -> Result<()> {
    let Some(mut conn) = connection().await? else {
        return Ok(());
    };
    let registry_key = scratch_key("registry");
    let cursor_key = scratch_key("cursor");
    let registry: Arc<dyn RegistryStore> = Arc::new(RedisRegistryStore::with_connection(
        conn.clone(),
        registry_key.clone(),
    ));
    for name in ["a", "b", "c"] {
        registry.upsert(worker(name, &format!("http://{name}:1"))).await?;
    }

    // Two control-plane instances sharing one cursor.
    let first = DispatchCounter::new(
        Arc::clone(&registry),
        Arc::new(RedisCursorStore::with_key(conn.clone(), cursor_key.clone())),
    );
    let second = DispatchCounter::new(
        Arc::clone(&registry),
        Arc::new(RedisCursorStore::with_key(conn.clone(), cursor_key.clone())),
    );

    let mut urls = Vec::new();
    for round in 0..6 {
        let counter = if round % 2 == 0 { &first } else { &second };
        urls.push(counter.next().await?);
    }
    assert_eq!(
        urls,
        ["http://a:1", "http://b:1", "http://c:1", "http://a:1", "http://b:1", "http://c:1"]
    );

    let cursor = RedisCursorStore::with_key(conn.clone(), cursor_key.clone());
    assert!(cursor.fetch_advance(0).await.is_err());

    cleanup(&mut conn, &registry_key).await?;
    cleanup(&mut conn, &cursor_key).await
}
