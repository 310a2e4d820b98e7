use std::fmt;

use async_trait::async_trait;
use logfleet_model::WorkerRegistration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::{RegistryStore, UpsertOutcome, apply_remove, apply_upsert};
use crate::error::{FleetError, Result};

const MAILBOX_CAPACITY: usize = 256;

enum RegistryCommand {
    Upsert {
        registration: WorkerRegistration,
        reply: oneshot::Sender<UpsertOutcome>,
    },
    Remove {
        identifier: String,
        reply: oneshot::Sender<Option<WorkerRegistration>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<WorkerRegistration>>,
    },
}

/// Process-local registry owned by a single actor task.
///
/// The task holds the only copy of the list; callers talk to it through a
/// mailbox, so every command runs to completion before the next starts.
/// The task exits once every handle has been dropped.
#[derive(Clone)]
pub struct InMemoryRegistry {
    mailbox: mpsc::Sender<RegistryCommand>,
}

impl fmt::Debug for InMemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRegistry")
            .field("mailbox_closed", &self.mailbox.is_closed())
            .finish()
    }
}

impl InMemoryRegistry {
    /// Spawn the owning task. Must be called inside a Tokio runtime.
    pub fn spawn() -> Self {
        let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
        tokio::spawn(run_actor(inbox));
        Self { mailbox }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(build(reply))
            .await
            .map_err(|_| actor_stopped())?;
        response.await.map_err(|_| actor_stopped())
    }
}

fn actor_stopped() -> FleetError {
    FleetError::StoreUnavailable("registry actor stopped".to_string())
}

async fn run_actor(mut inbox: mpsc::Receiver<RegistryCommand>) {
    let mut entries: Vec<WorkerRegistration> = Vec::new();

    while let Some(command) = inbox.recv().await {
        match command {
            RegistryCommand::Upsert {
                registration,
                reply,
            } => {
                let outcome = apply_upsert(&mut entries, registration);
                let _ = reply.send(outcome);
            }
            RegistryCommand::Remove { identifier, reply } => {
                let removed = apply_remove(&mut entries, &identifier);
                let _ = reply.send(removed);
            }
            RegistryCommand::Snapshot { reply } => {
                let _ = reply.send(entries.clone());
            }
        }
    }

    debug!("in-memory registry actor stopped");
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    async fn upsert(
        &self,
        registration: WorkerRegistration,
    ) -> Result<UpsertOutcome> {
        self.request(|reply| RegistryCommand::Upsert {
            registration,
            reply,
        })
        .await
    }

    async fn remove(
        &self,
        identifier: &str,
    ) -> Result<Option<WorkerRegistration>> {
        let identifier = identifier.to_string();
        self.request(|reply| RegistryCommand::Remove { identifier, reply })
            .await
    }

    async fn try_list(&self) -> Result<Vec<WorkerRegistration>> {
        self.request(|reply| RegistryCommand::Snapshot { reply })
            .await
    }
}
