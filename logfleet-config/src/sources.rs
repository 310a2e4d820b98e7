use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{parse_bool_var, parse_var};

/// Raw configuration as defined in a TOML file.
///
/// Durations are humantime strings such as `"10s"` or `"1m 30s"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub heartbeat: FileHeartbeatConfig,
    #[serde(default)]
    pub store_health: FileStoreHealthConfig,
    #[serde(default)]
    pub registration: FileRegistrationConfig,
    #[serde(default)]
    pub replication: FileReplicationConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileHeartbeatConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStoreHealthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileRegistrationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_register: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_delay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileReplicationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_backoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_backoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub redis_url: Option<String>,
    pub heartbeat_interval: Option<String>,
    pub heartbeat_probe_timeout: Option<String>,
    pub store_health_interval: Option<String>,
    pub control_plane_url: Option<String>,
    pub service_name: Option<String>,
    pub service_port: Option<u16>,
    pub service_ip_address: Option<String>,
    pub service_url: Option<String>,
    pub auto_register: Option<bool>,
    pub registration_startup_delay: Option<String>,
    pub registration_timeout: Option<String>,
    pub replication_channel: Option<String>,
    pub replication_initial_backoff: Option<String>,
    pub replication_max_backoff: Option<String>,
    pub replication_connect_timeout: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };

        Self {
            config_path: var("LOGFLEET_CONFIG").map(PathBuf::from),
            server_host: var("SERVER_HOST"),
            server_port: parse_var("SERVER_PORT"),
            redis_url: var("REDIS_URL"),
            heartbeat_interval: var("HEARTBEAT_INTERVAL"),
            heartbeat_probe_timeout: var("HEARTBEAT_PROBE_TIMEOUT"),
            store_health_interval: var("STORE_HEALTH_INTERVAL"),
            control_plane_url: var("CONTROL_PLANE_URL"),
            service_name: var("SERVICE_NAME"),
            service_port: parse_var("SERVICE_PORT"),
            service_ip_address: var("SERVICE_IP_ADDRESS"),
            service_url: var("SERVICE_URL"),
            auto_register: parse_bool_var("AUTO_REGISTER"),
            registration_startup_delay: var("REGISTRATION_STARTUP_DELAY"),
            registration_timeout: var("REGISTRATION_TIMEOUT"),
            replication_channel: var("REPLICATION_CHANNEL"),
            replication_initial_backoff: var("REPLICATION_INITIAL_BACKOFF"),
            replication_max_backoff: var("REPLICATION_MAX_BACKOFF"),
            replication_connect_timeout: var("REPLICATION_CONNECT_TIMEOUT"),
        }
    }
}
