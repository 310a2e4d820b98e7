use std::fmt;

use chrono::{DateTime, Utc};
use logfleet_model::ReplicationMessage;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::error::{FleetError, Result};

/// One node attached to the replication hub.
#[derive(Clone)]
pub struct Subscriber {
    /// Unique connection ID
    pub id: Uuid,
    pub connected_at: DateTime<Utc>,
    /// Channel feeding this connection's outgoing socket task
    sender: mpsc::Sender<ReplicationMessage>,
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .field("channel_closed", &self.sender.is_closed())
            .finish()
    }
}

impl Subscriber {
    pub fn new(sender: mpsc::Sender<ReplicationMessage>) -> Self {
        Self {
            id: Uuid::now_v7(),
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Queue a message without waiting. A full or closed queue is a
    /// replication failure for this subscriber only.
    pub fn deliver(&self, message: ReplicationMessage) -> Result<()> {
        self.sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => FleetError::ReplicationFailure(format!(
                "subscriber {} is not keeping up",
                self.id
            )),
            TrySendError::Closed(_) => FleetError::ReplicationFailure(format!(
                "subscriber {} disconnected",
                self.id
            )),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
