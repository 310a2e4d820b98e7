use std::{fmt, sync::Arc};

use dashmap::DashMap;
use futures::StreamExt;
use logfleet_model::{LogEvent, OriginId, ReplicationEnvelope, ReplicationMessage};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    Backoff,
    backplane::{Backplane, BackplaneFrame},
    subscriber::Subscriber,
};

/// Control-plane side of replication: the set of connected nodes and the
/// fanout between them.
///
/// The hub stores nothing. A `ReplicateEvent` from one subscriber goes out
/// as `ReceiveReplicatedEvent` to every other local subscriber and onto the
/// backplane; frames from other instances go to every local subscriber.
/// Delivery is best-effort with no replay for nodes that were not connected.
pub struct ReplicationHub {
    hub_id: Uuid,
    origin: OriginId,
    /// Held until both local and remote fanout of an ingested event are done.
    sequence: Mutex<u64>,
    subscribers: DashMap<Uuid, Arc<Subscriber>>,
    backplane: Arc<dyn Backplane>,
}

impl fmt::Debug for ReplicationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationHub")
            .field("hub_id", &self.hub_id)
            .field("subscriber_count", &self.subscribers.len())
            .field("backplane", &self.backplane)
            .finish()
    }
}

impl ReplicationHub {
    pub fn new(node: impl Into<String>, backplane: Arc<dyn Backplane>) -> Self {
        Self {
            hub_id: Uuid::now_v7(),
            origin: OriginId::new(node),
            sequence: Mutex::new(0),
            subscribers: DashMap::new(),
            backplane,
        }
    }

    pub fn hub_id(&self) -> Uuid {
        self.hub_id
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    pub fn is_distributed(&self) -> bool {
        self.backplane.is_distributed()
    }

    /// Attach a node. Messages for it are queued on `sender`.
    pub fn subscribe(&self, sender: mpsc::Sender<ReplicationMessage>) -> Arc<Subscriber> {
        let subscriber = Arc::new(Subscriber::new(sender));
        self.subscribers.insert(subscriber.id, subscriber.clone());
        info!(subscriber = %subscriber.id, total = self.subscribers.len(), "replication subscriber connected");
        subscriber
    }

    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.remove(&id).is_some() {
            info!(subscriber = %id, total = self.subscribers.len(), "replication subscriber disconnected");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send to every local subscriber except `exclude`. Returns how many
    /// accepted the message.
    fn fan_out(&self, envelope: &ReplicationEnvelope, exclude: Option<Uuid>) -> usize {
        let targets: Vec<Arc<Subscriber>> = self
            .subscribers
            .iter()
            .filter(|entry| Some(*entry.key()) != exclude)
            .map(|entry| entry.value().clone())
            .collect();

        let mut delivered = 0;
        for subscriber in targets {
            let message = ReplicationMessage::ReceiveReplicatedEvent {
                envelope: envelope.clone(),
            };
            match subscriber.deliver(message) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(subscriber = %subscriber.id, error = %err, "dropping replicated event"),
            }
        }
        delivered
    }

    async fn publish_remote(&self, envelope: ReplicationEnvelope) {
        let frame = BackplaneFrame {
            hub_id: self.hub_id,
            envelope,
        };
        if let Err(err) = self.backplane.publish(&frame).await {
            warn!(error = %err, "backplane publish failed; event reached local subscribers only");
        }
    }

    /// An event published by subscriber `from`.
    pub async fn replicate_from(&self, from: Uuid, envelope: ReplicationEnvelope) -> usize {
        let delivered = self.fan_out(&envelope, Some(from));
        debug!(
            origin = %envelope.origin.node,
            sequence = envelope.sequence,
            delivered,
            "fanned out replicated event"
        );
        self.publish_remote(envelope).await;
        delivered
    }

    /// An event accepted by the control plane itself from an external
    /// client. Goes to every subscriber.
    pub async fn ingest(&self, event: LogEvent) -> (ReplicationEnvelope, usize) {
        let mut last = self.sequence.lock().await;
        *last += 1;
        let envelope = ReplicationEnvelope {
            origin: self.origin.clone(),
            sequence: *last,
            event,
        };
        let delivered = self.fan_out(&envelope, None);
        self.publish_remote(envelope.clone()).await;
        drop(last);
        (envelope, delivered)
    }

    /// A frame from the backplane. Frames this hub published are skipped;
    /// their local fanout already happened.
    pub fn deliver_remote(&self, frame: BackplaneFrame) -> usize {
        if frame.hub_id == self.hub_id {
            return 0;
        }
        self.fan_out(&frame.envelope, None)
    }

    /// Keep a backplane subscription open until `shutdown`, resubscribing
    /// with backoff whenever it drops.
    pub async fn run_backplane_listener(self: Arc<Self>, shutdown: CancellationToken, mut backoff: Backoff) {
        if !self.backplane.is_distributed() {
            shutdown.cancelled().await;
            return;
        }

        loop {
            match self.backplane.subscribe().await {
                Ok(mut frames) => {
                    backoff.reset();
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                info!("Backplane listener shutting down");
                                return;
                            }
                            frame = frames.next() => match frame {
                                Some(frame) => {
                                    self.deliver_remote(frame);
                                }
                                None => {
                                    warn!("backplane subscription ended");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(err) => warn!(error = %err, "backplane subscribe failed"),
            }

            let delay = backoff.next_delay();
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    pub fn spawn_backplane_listener(self: &Arc<Self>, shutdown: CancellationToken, backoff: Backoff) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_backplane_listener(shutdown, backoff))
    }
}
