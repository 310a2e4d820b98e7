//! Resolved configuration handed to the rest of the system.

use std::{path::PathBuf, time::Duration};

/// Fully resolved configuration for either process role.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Listener settings.
    pub server: ServerConfig,
    /// Shared store; `None` runs everything in process memory.
    pub redis: Option<RedisConfig>,
    /// Control-plane liveness probing.
    pub heartbeat: HeartbeatSettings,
    /// Control-plane store health reporting.
    pub store_health: StoreHealthSettings,
    /// Worker self-registration.
    pub registration: RegistrationSettings,
    /// Replication transport.
    pub replication: ReplicationSettings,
    /// Where the values came from.
    pub metadata: ConfigMetadata,
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Redis connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// `redis://` connection url.
    pub url: String,
}

/// Heartbeat probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    /// Time between probe cycles.
    pub interval: Duration,
    /// Per-probe deadline.
    pub probe_timeout: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(3),
        }
    }
}

/// Store health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHealthSettings {
    /// Time between checks.
    pub interval: Duration,
}

impl Default for StoreHealthSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Worker self-registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSettings {
    /// Control plane to register with.
    pub control_plane_url: Option<String>,
    /// Advertised worker name.
    pub name: String,
    /// Advertised port; defaults to the listener port.
    pub port: u16,
    /// Advertised address; discovered when unset.
    pub ip_address: Option<String>,
    /// Advertised url; derived from address and port when unset.
    pub url: Option<String>,
    /// Whether to register at all.
    pub auto_register: bool,
    /// Wait before registering.
    pub startup_delay: Duration,
    /// Deadline for registration calls.
    pub request_timeout: Duration,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            control_plane_url: None,
            name: "LogApi".to_string(),
            port: 5000,
            ip_address: None,
            url: None,
            auto_register: true,
            startup_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Replication transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationSettings {
    /// Backplane pub/sub channel.
    pub channel: String,
    /// First reconnect delay.
    pub initial_backoff: Duration,
    /// Reconnect delay ceiling.
    pub max_backoff: Duration,
    /// Deadline for one connection attempt.
    pub connect_timeout: Duration,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            channel: "logfleet:replication".to_string(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Provenance of the loaded configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    /// TOML file that was read, if any.
    pub config_path: Option<PathBuf>,
    /// Whether a `.env` file was applied.
    pub env_file_loaded: bool,
}
