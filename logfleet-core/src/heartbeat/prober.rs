use std::{fmt, time::Duration};

use async_trait::async_trait;
use logfleet_model::routes::HEALTH;

use crate::error::{FleetError, Result};

/// Liveness check against one worker.
#[async_trait]
pub trait Prober: Send + Sync + fmt::Debug {
    /// `Ok` means alive. Any error is a [`FleetError::ProbeFailure`].
    async fn probe(&self, worker_url: &str) -> Result<()>;
}

/// Probes `GET {worker}/health` and accepts any 2xx.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

pub(crate) fn health_url(worker_url: &str) -> String {
    format!("{}{}", worker_url.trim_end_matches('/'), HEALTH)
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, worker_url: &str) -> Result<()> {
        let failure = |reason: String| FleetError::ProbeFailure {
            url: worker_url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(health_url(worker_url))
            .send()
            .await
            .map_err(|err| failure(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(failure(format!("health endpoint returned {}", response.status())))
        }
    }
}
