//! Worker registry: the ordered list of workers eligible for dispatch.
//!
//! Insertion order is dispatch order. Every mutation is a single atomic
//! step against the backing store (an actor mailbox in memory, a Lua script
//! in Redis), so concurrent upserts and removals never interleave a read
//! with someone else's write.

mod entries;
mod health;
mod memory;
mod redis_store;

use std::fmt;

use async_trait::async_trait;
use logfleet_model::WorkerRegistration;
use tracing::warn;

use crate::error::Result;

pub use entries::{apply_remove, apply_upsert};
pub use health::StoreHealthMonitor;
pub use memory::InMemoryRegistry;
pub use redis_store::{REGISTRY_KEY, RedisRegistryStore};

/// What an upsert did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Replaced the entry at this zero-based position.
    Replaced(usize),
}

#[async_trait]
pub trait RegistryStore: Send + Sync + fmt::Debug {
    /// Replace the entry matching `registration` by name or url in place,
    /// or append it when nothing matches.
    async fn upsert(
        &self,
        registration: WorkerRegistration,
    ) -> Result<UpsertOutcome>;

    /// Remove at most one entry whose name or url equals `identifier`.
    /// Returns the removed entry; absence is not an error.
    async fn remove(
        &self,
        identifier: &str,
    ) -> Result<Option<WorkerRegistration>>;

    /// Snapshot of the registry, surfacing store failures.
    async fn try_list(&self) -> Result<Vec<WorkerRegistration>>;

    async fn try_count(&self) -> Result<usize> {
        Ok(self.try_list().await?.len())
    }

    /// Snapshot of the registry. An unreachable store reads as empty so
    /// callers keep serving; the failure is logged.
    async fn list(&self) -> Vec<WorkerRegistration> {
        match self.try_list().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "registry read failed; treating registry as empty");
                Vec::new()
            }
        }
    }

    async fn count(&self) -> usize {
        match self.try_count().await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "registry count failed; reporting zero workers");
                0
            }
        }
    }

    async fn find(&self, identifier: &str) -> Option<WorkerRegistration> {
        self.list()
            .await
            .into_iter()
            .find(|entry| entry.matches(identifier))
    }
}
