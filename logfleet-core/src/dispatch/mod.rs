//! Round-robin dispatch across registered workers.

mod cursor;

use std::{fmt, sync::Arc};

use logfleet_model::WorkerRegistration;
use tracing::{debug, warn};

use crate::{
    error::{FleetError, Result},
    registry::RegistryStore,
};

pub use cursor::{CURSOR_KEY, CursorStore, InMemoryCursor, RedisCursorStore};

/// Hands out workers in registry order, one per call, wrapping around.
///
/// The cursor lives in a [`CursorStore`] rather than in this struct so
/// every caller, and every control-plane instance sharing the store, advances
/// the same position.
pub struct DispatchCounter {
    registry: Arc<dyn RegistryStore>,
    cursor: Arc<dyn CursorStore>,
    fallback: InMemoryCursor,
}

impl fmt::Debug for DispatchCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchCounter")
            .field("registry", &self.registry)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl DispatchCounter {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        cursor: Arc<dyn CursorStore>,
    ) -> Self {
        Self {
            registry,
            cursor,
            fallback: InMemoryCursor::default(),
        }
    }

    /// Url of the next worker.
    pub async fn next(&self) -> Result<String> {
        self.next_worker().await.map(|worker| worker.url)
    }

    pub async fn next_worker(&self) -> Result<WorkerRegistration> {
        let mut snapshot = self.registry.list().await;
        if snapshot.is_empty() {
            return Err(FleetError::EmptyRegistry);
        }

        let size = snapshot.len();
        let slot = match self.cursor.fetch_advance(size).await {
            Ok(slot) => slot,
            Err(err) => {
                warn!(error = %err, "dispatch cursor unavailable; using process-local cursor");
                self.fallback.advance(size)
            }
        };

        // Stores reduce modulo `size` already; guard against a foreign writer.
        let worker = snapshot.swap_remove(slot % size);
        debug!(worker = %worker.url, slot, size, "dispatching");
        Ok(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{InMemoryRegistry, tests::UnreachableRegistry};
    use async_trait::async_trait;

    /// A cursor store that is always down.
    #[derive(Debug)]
    struct UnreachableCursor;

    #[async_trait]
    impl CursorStore for UnreachableCursor {
        async fn fetch_advance(&self, _modulus: usize) -> Result<usize> {
            Err(FleetError::StoreUnavailable("connection refused".to_string()))
        }
    }

    fn worker(name: &str) -> WorkerRegistration {
        WorkerRegistration::new(name, format!("http://{name}:5000"), "10.0.0.1")
    }

    async fn counter_with(names: &[&str]) -> (DispatchCounter, Arc<InMemoryRegistry>) {
        let registry = Arc::new(InMemoryRegistry::spawn());
        for name in names {
            registry.upsert(worker(name)).await.unwrap();
        }
        let counter = DispatchCounter::new(
            registry.clone(),
            Arc::new(InMemoryCursor::default()),
        );
        (counter, registry)
    }

    #[tokio::test]
    async fn empty_registry_is_an_error() {
        let (counter, _) = counter_with(&[]).await;
        assert!(matches!(counter.next().await, Err(FleetError::EmptyRegistry)));
    }

    #[tokio::test]
    async fn each_worker_once_per_round() {
        let (counter, _) = counter_with(&["a", "b", "c", "d"]).await;

        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(counter.next_worker().await.unwrap().name);
        }

        assert_eq!(seen, ["a", "b", "c", "d", "a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn eviction_mid_round_cycles_survivors() {
        let (counter, registry) = counter_with(&["a", "b", "c"]).await;

        assert_eq!(counter.next_worker().await.unwrap().name, "a");
        assert_eq!(counter.next_worker().await.unwrap().name, "b");
        registry.remove("b").await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(counter.next_worker().await.unwrap().name);
        }
        let mut distinct = seen.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct, ["a", "c"]);
        assert_ne!(seen[0], seen[1]);
        assert_eq!(seen[0], seen[2]);
    }

    #[tokio::test]
    async fn concurrent_callers_split_a_round_evenly() {
        let (counter, _) = counter_with(&["a", "b", "c"]).await;
        let counter = Arc::new(counter);

        let mut tasks = Vec::new();
        for _ in 0..30 {
            let counter = Arc::clone(&counter);
            tasks.push(tokio::spawn(async move {
                counter.next_worker().await.unwrap().name
            }));
        }

        let mut tally = std::collections::HashMap::new();
        for task in tasks {
            *tally.entry(task.await.unwrap()).or_insert(0) += 1;
        }
        assert_eq!(tally.len(), 3);
        assert!(tally.values().all(|count| *count == 10));
    }

    #[tokio::test]
    async fn unreachable_registry_dispatches_nothing() {
        let counter = DispatchCounter::new(
            Arc::new(UnreachableRegistry),
            Arc::new(InMemoryCursor::default()),
        );
        assert!(matches!(counter.next().await, Err(FleetError::EmptyRegistry)));
    }

    #[tokio::test]
    async fn unreachable_cursor_falls_back_to_local_round_robin() {
        let registry = Arc::new(InMemoryRegistry::spawn());
        for name in ["a", "b", "c"] {
            registry.upsert(worker(name)).await.unwrap();
        }
        let counter = DispatchCounter::new(registry, Arc::new(UnreachableCursor));

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(counter.next_worker().await.unwrap().name);
        }

        assert_eq!(seen, ["a", "b", "c", "a"]);
    }
}
