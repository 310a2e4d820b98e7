use std::{collections::HashMap, fmt};

use logfleet_model::{LogEvent, OriginId, ReplicationEnvelope};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    error::{FleetError, Result},
    logs::LogStore,
};

const OUTBOUND_CAPACITY: usize = 1024;

/// What happened to an envelope offered on the passive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Stored under this key.
    Applied(String),
    /// Already applied, or older than something already applied.
    Duplicate,
    /// Published by this node; never stored twice.
    OwnOrigin,
}

#[derive(Debug, Clone)]
pub struct Published {
    pub key: String,
    pub envelope: ReplicationEnvelope,
    /// Number of outbound links the envelope was handed to.
    pub links: usize,
}

/// Node-side replication: the publish path and the passive path.
///
/// Every published envelope carries this node's origin and the next value
/// of a per-origin sequence. Receivers remember the highest sequence seen
/// per origin, so an envelope is applied at most once whatever route it
/// took to get here, and the passive path never produces outbound traffic.
pub struct ReplicationBus {
    origin: OriginId,
    store: LogStore,
    /// Held across sequence assignment and the outbound send, so links see
    /// envelopes in sequence order.
    sequence: Mutex<u64>,
    watermarks: Mutex<HashMap<OriginId, u64>>,
    outbound: broadcast::Sender<ReplicationEnvelope>,
}

impl fmt::Debug for ReplicationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationBus")
            .field("origin", &self.origin)
            .field("sequence", &*self.sequence.lock())
            .field("outbound_links", &self.outbound.receiver_count())
            .finish()
    }
}

impl ReplicationBus {
    pub fn new(origin: OriginId, store: LogStore) -> Self {
        let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
        Self {
            origin,
            store,
            sequence: Mutex::new(0),
            watermarks: Mutex::new(HashMap::new()),
            outbound,
        }
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Envelopes this node publishes, for whatever link carries them off-node.
    /// Only envelopes published after subscribing are seen.
    pub fn subscribe_outbound(&self) -> broadcast::Receiver<ReplicationEnvelope> {
        self.outbound.subscribe()
    }

    /// Publish path: store locally, then hand to every outbound link.
    ///
    /// A failed hand-off is logged and does not undo the local write.
    pub fn replicate(&self, event: LogEvent) -> Result<Published> {
        let key = self.store.append(&event)?;

        let mut last = self.sequence.lock();
        *last += 1;
        let sequence = *last;
        let envelope = ReplicationEnvelope {
            origin: self.origin.clone(),
            sequence,
            event,
        };
        let sent = self.outbound.send(envelope.clone());
        drop(last);

        let links = match sent {
            Ok(links) => links,
            Err(_) => {
                let err = FleetError::ReplicationFailure(
                    "no replication link connected".to_string(),
                );
                warn!(error = %err, sequence, "event stored locally only");
                0
            }
        };

        debug!(%key, sequence, links, "published log event");
        Ok(Published {
            key,
            envelope,
            links,
        })
    }

    /// Passive path: store an envelope that arrived from elsewhere. Never
    /// republishes.
    pub fn receive_replicated(
        &self,
        envelope: ReplicationEnvelope,
    ) -> Result<ReceiveOutcome> {
        if envelope.origin == self.origin {
            return Ok(ReceiveOutcome::OwnOrigin);
        }

        let mut watermarks = self.watermarks.lock();
        let seen = watermarks.get(&envelope.origin).copied().unwrap_or(0);
        if envelope.sequence <= seen {
            debug!(
                origin = %envelope.origin.node,
                sequence = envelope.sequence,
                seen,
                "dropping already-applied envelope"
            );
            return Ok(ReceiveOutcome::Duplicate);
        }

        let key = self.store.append_without_replication(&envelope.event)?;
        watermarks.insert(envelope.origin, envelope.sequence);
        Ok(ReceiveOutcome::Applied(key))
    }

    /// Highest sequence applied from `origin`.
    pub fn watermark(&self, origin: &OriginId) -> Option<u64> {
        self.watermarks.lock().get(origin).copied()
    }
}
