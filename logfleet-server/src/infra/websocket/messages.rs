use anyhow::Result;
use axum::extract::ws::{Message, Utf8Bytes};
use tokio_tungstenite::tungstenite;

use logfleet_model::ReplicationMessage;

/// Encode for the hub side of the socket.
pub fn replication_to_websocket(msg: &ReplicationMessage) -> Result<Message> {
    let json = serde_json::to_string(msg)?;
    Ok(Message::Text(Utf8Bytes::from(json)))
}

/// Decode a frame received by the hub. `None` for control frames.
pub fn websocket_to_replication(msg: &Message) -> Option<Result<ReplicationMessage>> {
    match msg {
        Message::Text(text) => Some(serde_json::from_str(text.as_str()).map_err(Into::into)),
        Message::Binary(bin) => Some(serde_json::from_slice(bin.as_ref()).map_err(Into::into)),
        _ => None,
    }
}

/// Encode for the worker side of the socket.
pub fn replication_to_tungstenite(msg: &ReplicationMessage) -> Result<tungstenite::Message> {
    let json = serde_json::to_string(msg)?;
    Ok(tungstenite::Message::text(json))
}

/// Decode a frame received by a worker. `None` for control frames.
pub fn tungstenite_to_replication(
    msg: &tungstenite::Message,
) -> Option<Result<ReplicationMessage>> {
    match msg {
        tungstenite::Message::Text(text) => {
            Some(serde_json::from_str(text.as_str()).map_err(Into::into))
        }
        tungstenite::Message::Binary(bin) => {
            Some(serde_json::from_slice(bin.as_ref()).map_err(Into::into))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfleet_model::{LogEvent, OriginId, ReplicationEnvelope};

    fn sample() -> ReplicationMessage {
        ReplicationMessage::ReplicateEvent {
            envelope: ReplicationEnvelope {
                origin: OriginId::new("worker-a"),
                sequence: 3,
                event: LogEvent::new("worker-a", "disk full"),
            },
        }
    }

    #[test]
    fn worker_frames_decode_on_the_hub() {
        let outbound = replication_to_tungstenite(&sample()).expect("encode");
        let tungstenite::Message::Text(text) = outbound else {
            panic!("expected a text frame");
        };
        let inbound = Message::Text(Utf8Bytes::from(text.as_str()));
        let decoded = websocket_to_replication(&inbound)
            .expect("data frame")
            .expect("decode");
        assert_eq!(decoded, sample());
    }

    #[test]
    fn control_frames_are_not_messages() {
        assert!(websocket_to_replication(&Message::Ping(Default::default())).is_none());
        assert!(
            tungstenite_to_replication(&tungstenite::Message::Pong(Default::default()))
                .is_none()
        );
    }
}
