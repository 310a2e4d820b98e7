//! Hub side of the replication channel.

use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use logfleet_model::ReplicationMessage;

use crate::infra::{
    app_state::ControlPlaneState,
    websocket::{replication_to_websocket, websocket_to_replication},
};

const SUBSCRIBER_QUEUE: usize = 256;
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Attach a worker to the replication hub.
pub async fn replicate_handler(
    ws: WebSocketUpgrade,
    State(state): State<ControlPlaneState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: ControlPlaneState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ReplicationMessage>(SUBSCRIBER_QUEUE);

    let subscriber = state.hub.subscribe(tx);
    let subscriber_id = subscriber.id;

    let outgoing_shutdown = state.shutdown.clone();
    let mut outgoing = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = outgoing_shutdown.cancelled() => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    match replication_to_websocket(&msg) {
                        Ok(frame) => {
                            if ws_sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to encode replication message: {}", e),
                    }
                }
            }
        }
    });

    let mut outgoing_finished = false;
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = &mut outgoing, if !outgoing_finished => {
                outgoing_finished = true;
                break;
            }
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(msg)) => handle_frame(&state, subscriber_id, &msg).await,
                Some(Err(e)) => {
                    debug!(subscriber = %subscriber_id, "WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    // Dropping the last sender ends the outgoing task.
    state.hub.unsubscribe(subscriber_id);
    drop(subscriber);
    if !outgoing_finished {
        let _ = tokio::time::timeout(CLOSE_GRACE, outgoing).await;
    }
}

async fn handle_frame(state: &ControlPlaneState, subscriber_id: Uuid, frame: &Message) {
    let message = match websocket_to_replication(frame) {
        Some(Ok(message)) => message,
        Some(Err(e)) => {
            warn!(subscriber = %subscriber_id, "Ignoring malformed replication frame: {}", e);
            return;
        }
        None => return,
    };

    match message {
        ReplicationMessage::ReplicateEvent { envelope } => {
            state.hub.replicate_from(subscriber_id, envelope).await;
        }
        ReplicationMessage::ReceiveReplicatedEvent { .. } => {
            debug!(subscriber = %subscriber_id, "ignoring hub-bound receive message");
        }
    }
}
