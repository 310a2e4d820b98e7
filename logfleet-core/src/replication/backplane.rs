use std::fmt;

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use logfleet_model::ReplicationEnvelope;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;

pub const DEFAULT_CHANNEL: &str = "logfleet:replication";

/// An envelope crossing between control-plane instances, tagged with the
/// hub that put it on the backplane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackplaneFrame {
    pub hub_id: Uuid,
    pub envelope: ReplicationEnvelope,
}

/// Transport shared by control-plane instances so replication reaches
/// workers attached to a different instance.
#[async_trait]
pub trait Backplane: Send + Sync + fmt::Debug {
    async fn publish(&self, frame: &BackplaneFrame) -> Result<()>;

    /// Frames from every instance, including this one. Ends when the
    /// underlying connection drops.
    async fn subscribe(&self) -> Result<BoxStream<'static, BackplaneFrame>>;

    fn is_distributed(&self) -> bool;
}

/// Single-instance mode: nothing leaves the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackplane;

#[async_trait]
impl Backplane for LocalBackplane {
    async fn publish(&self, _frame: &BackplaneFrame) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, BackplaneFrame>> {
        Ok(futures::stream::pending().boxed())
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

/// Redis pub/sub backplane.
pub struct RedisBackplane {
    client: redis::Client,
    publisher: ConnectionManager,
    channel: String,
}

impl fmt::Debug for RedisBackplane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackplane")
            .field("channel", &self.channel)
            .finish()
    }
}

impl RedisBackplane {
    pub async fn connect(redis_url: &str, channel: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            client,
            publisher,
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl Backplane for RedisBackplane {
    async fn publish(&self, frame: &BackplaneFrame) -> Result<()> {
        let payload = serde_json::to_string(frame)?;
        let mut conn = self.publisher.clone();
        let _: i64 = conn.publish(&self.channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, BackplaneFrame>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        info!(channel = %self.channel, "subscribed to replication backplane");

        let frames = pubsub.into_on_message().filter_map(|message| async move {
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "unreadable backplane message");
                    return None;
                }
            };
            match serde_json::from_str::<BackplaneFrame>(&payload) {
                Ok(frame) => Some(frame),
                Err(err) => {
                    debug!(error = %err, "ignoring foreign backplane payload");
                    None
                }
            }
        });
        Ok(frames.boxed())
    }

    fn is_distributed(&self) -> bool {
        true
    }
}

/// Redis backplane when a url is configured and reachable, otherwise the
/// local one. Losing the backplane costs cross-instance fanout, not service.
pub async fn connect_backplane(
    redis_url: Option<&str>,
    channel: &str,
) -> Arc<dyn Backplane> {
    let Some(url) = redis_url else {
        info!("no backplane configured; replication is single-instance");
        return Arc::new(LocalBackplane);
    };

    match RedisBackplane::connect(url, channel).await {
        Ok(backplane) => Arc::new(backplane),
        Err(err) => {
            warn!(error = %err, "replication backplane unavailable; falling back to single-instance fanout");
            Arc::new(LocalBackplane)
        }
    }
}
