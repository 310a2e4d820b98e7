//! Worker side of the replication channel.
//!
//! One long-lived WebSocket to the control plane's `/replicate` hub. Events
//! published on the local bus go out as `ReplicateEvent`; whatever the hub
//! sends back is applied through the passive path. The link reconnects
//! forever with doubling backoff until cancelled. Events published while
//! disconnected are stored locally only.

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::broadcast::error::RecvError, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logfleet_config::ReplicationSettings;
use logfleet_core::{
    FleetError,
    agent::normalize_control_plane_url,
    replication::{Backoff, ReceiveOutcome, ReplicationBus},
};
use logfleet_model::{ReplicationMessage, routes::REPLICATE};

use super::messages::{replication_to_tungstenite, tungstenite_to_replication};

type LinkStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub connect_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self::from(&ReplicationSettings::default())
    }
}

impl From<&ReplicationSettings> for LinkSettings {
    fn from(settings: &ReplicationSettings) -> Self {
        Self {
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff,
            connect_timeout: settings.connect_timeout,
        }
    }
}

/// `ws(s)://host[:port]/replicate` for a control-plane url.
pub fn replication_endpoint(control_plane_url: &str) -> Result<String, FleetError> {
    let base = normalize_control_plane_url(control_plane_url)?;
    let socket_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base
    } else {
        return Err(FleetError::Registration(format!(
            "unsupported control-plane scheme in {control_plane_url:?}"
        )));
    };
    Ok(format!("{socket_base}{REPLICATE}"))
}

enum SessionEnd {
    Shutdown,
    Dropped,
}

#[derive(Debug)]
pub struct ReplicationLink {
    endpoint: String,
    bus: Arc<ReplicationBus>,
    settings: LinkSettings,
}

impl ReplicationLink {
    pub fn new(
        control_plane_url: &str,
        bus: Arc<ReplicationBus>,
        settings: LinkSettings,
    ) -> Result<Self, FleetError> {
        Ok(Self {
            endpoint: replication_endpoint(control_plane_url)?,
            bus,
            settings,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut backoff =
            Backoff::new(self.settings.initial_backoff, self.settings.max_backoff);

        loop {
            let attempt = tokio::select! {
                _ = shutdown.cancelled() => return,
                attempt = tokio::time::timeout(
                    self.settings.connect_timeout,
                    connect_async(self.endpoint.as_str()),
                ) => attempt,
            };

            match attempt {
                Ok(Ok((stream, _))) => {
                    info!(endpoint = %self.endpoint, "replication link connected");
                    backoff.reset();
                    match self.session(stream, &shutdown).await {
                        SessionEnd::Shutdown => {
                            info!("replication link shutting down");
                            return;
                        }
                        SessionEnd::Dropped => {
                            warn!(endpoint = %self.endpoint, "replication link dropped")
                        }
                    }
                }
                Ok(Err(err)) => {
                    warn!(endpoint = %self.endpoint, error = %err, "replication connect failed")
                }
                Err(_) => warn!(
                    endpoint = %self.endpoint,
                    timeout = ?self.settings.connect_timeout,
                    "replication connect timed out"
                ),
            }

            let delay = backoff.next_delay();
            debug!(?delay, "reconnecting replication link");
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn session(&self, stream: LinkStream, shutdown: &CancellationToken) -> SessionEnd {
        // Subscribed per session: nothing is queued for a link that is down.
        let mut outbound = self.bus.subscribe_outbound();
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
                envelope = outbound.recv() => match envelope {
                    Ok(envelope) => {
                        let message = ReplicationMessage::ReplicateEvent { envelope };
                        match replication_to_tungstenite(&message) {
                            Ok(frame) => {
                                if let Err(err) = sink.send(frame).await {
                                    warn!(error = %err, "failed to send replicated event");
                                    return SessionEnd::Dropped;
                                }
                            }
                            Err(err) => warn!(error = %err, "failed to encode replicated event"),
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "replication link fell behind; events were not forwarded");
                    }
                    Err(RecvError::Closed) => return SessionEnd::Shutdown,
                },
                frame = source.next() => match frame {
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                    Some(Ok(frame)) => self.apply(&frame),
                    Some(Err(err)) => {
                        warn!(error = %err, "replication link read failed");
                        return SessionEnd::Dropped;
                    }
                },
            }
        }
    }

    fn apply(&self, frame: &Message) {
        let message = match tungstenite_to_replication(frame) {
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                warn!(error = %err, "ignoring malformed replication frame");
                return;
            }
            None => return,
        };

        // Anything the hub sends is someone else's event.
        match self.bus.receive_replicated(message.into_envelope()) {
            Ok(ReceiveOutcome::Applied(key)) => debug!(%key, "applied replicated event"),
            Ok(outcome) => debug!(?outcome, "skipped replicated event"),
            Err(err) => warn!(error = %err, "failed to store replicated event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_rewrites_http_schemes() {
        assert_eq!(
            replication_endpoint("http://cp:5000/").unwrap(),
            "ws://cp:5000/replicate"
        );
        assert_eq!(
            replication_endpoint("https://cp.example.com").unwrap(),
            "wss://cp.example.com/replicate"
        );
        assert_eq!(
            replication_endpoint("cp.internal:5000").unwrap(),
            "ws://cp.internal:5000/replicate"
        );
    }

    #[test]
    fn endpoint_rejects_unusable_urls() {
        assert!(replication_endpoint("").is_err());
        assert!(replication_endpoint("ftp://cp:21").is_err());
    }

    #[test]
    fn settings_follow_replication_config() {
        let settings = LinkSettings::default();
        assert_eq!(settings.initial_backoff, Duration::from_secs(1));
        assert_eq!(settings.max_backoff, Duration::from_secs(30));
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
    }
}
