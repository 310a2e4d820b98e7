//! Worker-side lifecycle: register with the control plane after start-up,
//! unregister on shutdown.
//!
//! Both calls are single attempts. A failure is logged and the worker keeps
//! serving local traffic; heartbeat eviction and the next restart cover the
//! rest.

mod address;

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use logfleet_model::{
    RegistrationStatus, UnregisterRequest, WorkerRegistration, routes::v1,
};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::error::{FleetError, Result};

pub use address::{discover_ip_address, normalize_control_plane_url};

pub const DEFAULT_SERVICE_NAME: &str = "LogApi";
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `{control_plane}/api/v1/registry/{identifier}` with the identifier
/// percent-encoded as a single path segment.
fn item_endpoint(control_plane: &str, identifier: &str) -> Result<Url> {
    let collection = format!("{control_plane}{}", v1::registry::COLLECTION);
    let mut url = Url::parse(&collection).map_err(|err| {
        FleetError::Registration(format!("invalid control plane url {collection:?}: {err}"))
    })?;
    url.path_segments_mut()
        .map_err(|()| {
            FleetError::Registration(format!("control plane url {collection:?} cannot hold a path"))
        })?
        .push(identifier);
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub control_plane_url: Option<String>,
    pub name: String,
    pub port: u16,
    /// Advertised address; discovered when unset.
    pub ip_address: Option<String>,
    /// Advertised url; `http://{ip}:{port}` when unset.
    pub url: Option<String>,
    pub auto_register: bool,
    pub startup_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            control_plane_url: None,
            name: DEFAULT_SERVICE_NAME.to_string(),
            port: 5000,
            ip_address: None,
            url: None,
            auto_register: true,
            startup_delay: DEFAULT_STARTUP_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl AgentConfig {
    /// The registration this worker advertises.
    pub fn registration(&self) -> WorkerRegistration {
        let ip = self
            .ip_address
            .clone()
            .filter(|ip| !ip.trim().is_empty())
            .unwrap_or_else(|| discover_ip_address().to_string());
        let url = self
            .url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://{ip}:{}", self.port));
        WorkerRegistration::new(self.name.clone(), url, ip)
    }
}

#[derive(Debug, Default)]
struct AgentState {
    registered: bool,
    last_registration: Option<DateTime<Utc>>,
}

pub struct SelfRegistrationAgent {
    config: AgentConfig,
    registration: WorkerRegistration,
    client: reqwest::Client,
    state: RwLock<AgentState>,
}

impl fmt::Debug for SelfRegistrationAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfRegistrationAgent")
            .field("registration", &self.registration)
            .field("control_plane_url", &self.config.control_plane_url)
            .field("registered", &self.state.read().registered)
            .finish()
    }
}

impl SelfRegistrationAgent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: AgentConfig, client: reqwest::Client) -> Self {
        let registration = config.registration();
        Self {
            config,
            registration,
            client,
            state: RwLock::new(AgentState::default()),
        }
    }

    pub fn registration(&self) -> &WorkerRegistration {
        &self.registration
    }

    fn control_plane(&self) -> Result<String> {
        normalize_control_plane_url(
            self.config.control_plane_url.as_deref().unwrap_or_default(),
        )
    }

    pub async fn register(&self) -> Result<()> {
        let endpoint = format!("{}{}", self.control_plane()?, v1::registry::COLLECTION);
        let response = self
            .client
            .post(&endpoint)
            .json(&self.registration)
            .send()
            .await
            .map_err(|err| FleetError::Registration(format!("POST {endpoint}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FleetError::Registration(format!(
                "control plane rejected registration ({status}): {body}"
            )));
        }

        let mut state = self.state.write();
        state.registered = true;
        state.last_registration = Some(Utc::now());
        info!(
            name = %self.registration.name,
            url = %self.registration.url,
            control_plane = %endpoint,
            "registered with control plane"
        );
        Ok(())
    }

    pub async fn unregister(&self) -> Result<()> {
        let endpoint = format!("{}{}", self.control_plane()?, v1::registry::UNREGISTER);
        let response = self
            .client
            .post(&endpoint)
            .json(&UnregisterRequest {
                identifier: self.registration.name.clone(),
            })
            .send()
            .await
            .map_err(|err| FleetError::Registration(format!("POST {endpoint}: {err}")))?;

        if !response.status().is_success() {
            return Err(FleetError::Registration(format!(
                "control plane rejected unregistration ({})",
                response.status()
            )));
        }

        self.state.write().registered = false;
        info!(name = %self.registration.name, "unregistered from control plane");
        Ok(())
    }

    /// Ask the control plane what it currently holds for this worker.
    pub async fn remote_registration(&self) -> Result<Option<WorkerRegistration>> {
        let endpoint = item_endpoint(&self.control_plane()?, &self.registration.name)?;
        let response = self.client.get(endpoint).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(FleetError::Registration(format!(
                "status lookup failed ({})",
                response.status()
            )));
        }
        Ok(Some(response.json().await?))
    }

    pub fn status(&self) -> RegistrationStatus {
        let state = self.state.read();
        RegistrationStatus {
            is_registered: state.registered,
            name: self.registration.name.clone(),
            url: self.registration.url.clone(),
            ip_address: self.registration.ip_address.clone(),
            control_plane_url: self.control_plane().ok(),
            last_registration: state.last_registration,
        }
    }

    /// Warm up, register once, wait for shutdown, unregister once.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        if !self.config.auto_register {
            info!("automatic registration disabled");
            return;
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(self.config.startup_delay) => {}
        }

        if let Err(err) = self.register().await {
            warn!(error = %err, "registration failed; continuing unregistered");
        }

        shutdown.cancelled().await;

        if let Err(err) = self.unregister().await {
            warn!(error = %err, "unregistration failed");
        }
    }

    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_url_keeps_identifier_in_one_segment() {
        let url = item_endpoint("http://10.0.0.5:8080", "team/a?b#c").unwrap();
        assert_eq!(
            url.as_str(),
            "http://10.0.0.5:8080/api/v1/registry/team%2Fa%3Fb%23c"
        );

        let plain = item_endpoint("http://10.0.0.5:8080/base", "worker-a").unwrap();
        assert_eq!(plain.path(), "/base/api/v1/registry/worker-a");
    }

    #[test]
    fn registration_prefers_configured_values() {
        let config = AgentConfig {
            name: "worker-1".to_string(),
            port: 6000,
            ip_address: Some("10.2.3.4".to_string()),
            ..AgentConfig::default()
        };
        let registration = config.registration();
        assert_eq!(registration.url, "http://10.2.3.4:6000");
        assert_eq!(registration.ip_address, "10.2.3.4");

        let explicit = AgentConfig {
            url: Some("http://worker.internal:6000/".to_string()),
            ..config
        };
        assert_eq!(explicit.registration().url, "http://worker.internal:6000");
    }

    #[tokio::test]
    async fn register_without_control_plane_is_a_registration_error() {
        let agent = SelfRegistrationAgent::new(AgentConfig {
            ip_address: Some("127.0.0.1".to_string()),
            ..AgentConfig::default()
        })
        .unwrap();

        assert!(matches!(
            agent.register().await,
            Err(FleetError::Registration(_))
        ));
        assert!(!agent.status().is_registered);
        assert_eq!(agent.status().control_plane_url, None);
    }
}
