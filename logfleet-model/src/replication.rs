use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::LogEvent;

/// Identity of a publishing node.
///
/// `incarnation` is regenerated on every process start so a restarted node
/// never collides with the sequence watermarks peers kept for its previous
/// life.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginId {
    pub node: String,
    pub incarnation: Uuid,
}

impl OriginId {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            incarnation: Uuid::now_v7(),
        }
    }
}

/// A log event in flight, tagged with who published it and in what order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationEnvelope {
    pub origin: OriginId,
    pub sequence: u64,
    pub event: LogEvent,
}

/// Frames exchanged on the replication channel.
///
/// Workers send `ReplicateEvent` to the hub; the hub forwards
/// `ReceiveReplicatedEvent` to every other subscriber. A node receiving
/// `ReceiveReplicatedEvent` stores it and never sends it on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReplicationMessage {
    ReplicateEvent { envelope: ReplicationEnvelope },
    ReceiveReplicatedEvent { envelope: ReplicationEnvelope },
}

impl ReplicationMessage {
    pub fn envelope(&self) -> &ReplicationEnvelope {
        match self {
            Self::ReplicateEvent { envelope }
            | Self::ReceiveReplicatedEvent { envelope } => envelope,
        }
    }

    pub fn into_envelope(self) -> ReplicationEnvelope {
        match self {
            Self::ReplicateEvent { envelope }
            | Self::ReceiveReplicatedEvent { envelope } => envelope,
        }
    }
}
