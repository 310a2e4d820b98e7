use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use crate::{
    models::{
        Config, ConfigMetadata, HeartbeatSettings, RedisConfig,
        RegistrationSettings, ReplicationSettings, ServerConfig,
        StoreHealthSettings,
    },
    sources::{EnvConfig, FileConfig},
    validation::ConfigWarnings,
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("logfleet.toml"),
        PathBuf::from("config/logfleet.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "No logfleet.toml detected; using environment variables and defaults",
                "Create logfleet.toml or set LOGFLEET_CONFIG to point at one",
            );
        }

        let mut config = compose_config(
            file_config.unwrap_or_default(),
            env_config,
            &mut warnings,
        )?;
        config.metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
        };

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        } else {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn duration(
    field: &'static str,
    env: Option<String>,
    file: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match env.or(file) {
        Some(raw) => humantime::parse_duration(raw.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value: raw,
                source,
            }
        }),
        None => Ok(default),
    }
}

fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    warnings: &mut ConfigWarnings,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        server: file_server,
        redis: file_redis,
        heartbeat: file_heartbeat,
        store_health: file_store_health,
        registration: file_registration,
        replication: file_replication,
    } = file;

    let server_defaults = ServerConfig::default();
    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or(server_defaults.host),
        port: env
            .server_port
            .or(file_server.port)
            .unwrap_or(server_defaults.port),
    };

    let redis = env
        .redis_url
        .map(|url| RedisConfig { url })
        .or_else(|| file_redis.map(|r| RedisConfig { url: r.url }));
    if redis.is_none() {
        warnings.push_with_hint(
            "No Redis configured; registry, dispatch cursor and replication are process-local",
            "Set REDIS_URL to share state between control-plane instances",
        );
    }

    let heartbeat_defaults = HeartbeatSettings::default();
    let heartbeat = HeartbeatSettings {
        interval: duration(
            "heartbeat.interval",
            env.heartbeat_interval,
            file_heartbeat.interval,
            heartbeat_defaults.interval,
        )?,
        probe_timeout: duration(
            "heartbeat.probe_timeout",
            env.heartbeat_probe_timeout,
            file_heartbeat.probe_timeout,
            heartbeat_defaults.probe_timeout,
        )?,
    };

    let store_health = StoreHealthSettings {
        interval: duration(
            "store_health.interval",
            env.store_health_interval,
            file_store_health.interval,
            StoreHealthSettings::default().interval,
        )?,
    };

    let registration_defaults = RegistrationSettings::default();
    let control_plane_url = env
        .control_plane_url
        .or(file_registration.control_plane_url);
    let registration = RegistrationSettings {
        control_plane_url,
        name: env
            .service_name
            .or(file_registration.name)
            .unwrap_or(registration_defaults.name),
        port: env
            .service_port
            .or(file_registration.port)
            .unwrap_or(server.port),
        ip_address: env.service_ip_address.or(file_registration.ip_address),
        url: env.service_url.or(file_registration.url),
        auto_register: env
            .auto_register
            .or(file_registration.auto_register)
            .unwrap_or(registration_defaults.auto_register),
        startup_delay: duration(
            "registration.startup_delay",
            env.registration_startup_delay,
            file_registration.startup_delay,
            registration_defaults.startup_delay,
        )?,
        request_timeout: duration(
            "registration.request_timeout",
            env.registration_timeout,
            file_registration.request_timeout,
            registration_defaults.request_timeout,
        )?,
    };

    let replication_defaults = ReplicationSettings::default();
    let replication = ReplicationSettings {
        channel: env
            .replication_channel
            .or(file_replication.channel)
            .unwrap_or(replication_defaults.channel),
        initial_backoff: duration(
            "replication.initial_backoff",
            env.replication_initial_backoff,
            file_replication.initial_backoff,
            replication_defaults.initial_backoff,
        )?,
        max_backoff: duration(
            "replication.max_backoff",
            env.replication_max_backoff,
            file_replication.max_backoff,
            replication_defaults.max_backoff,
        )?,
        connect_timeout: duration(
            "replication.connect_timeout",
            env.replication_connect_timeout,
            file_replication.connect_timeout,
            replication_defaults.connect_timeout,
        )?,
    };

    if replication.max_backoff < replication.initial_backoff {
        warnings.push(format!(
            "replication.max_backoff ({:?}) is below initial_backoff ({:?}); the initial value will be used as the ceiling",
            replication.max_backoff, replication.initial_backoff
        ));
    }

    Ok(Config {
        server,
        redis,
        heartbeat,
        store_health,
        registration,
        replication,
        metadata: ConfigMetadata::default(),
    })
}

impl Config {
    /// Control-plane url a worker should use, with a warning when it falls
    /// back to the local default.
    pub fn control_plane_url_or_default(
        &self,
        warnings: &mut ConfigWarnings,
    ) -> String {
        match &self.registration.control_plane_url {
            Some(url) => url.clone(),
            None => {
                warnings.push_with_hint(
                    "No control-plane url configured; using http://localhost:5000",
                    "Set CONTROL_PLANE_URL or registration.control_plane_url",
                );
                "http://localhost:5000".to_string()
            }
        }
    }
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(
            self,
            ConfigPathProvenance::Explicit | ConfigPathProvenance::Env
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{FileHeartbeatConfig, FileServerConfig};

    #[test]
    fn env_beats_file_beats_default() {
        let file = FileConfig {
            server: FileServerConfig {
                host: Some("10.0.0.1".to_string()),
                port: Some(7000),
            },
            heartbeat: FileHeartbeatConfig {
                interval: Some("20s".to_string()),
                probe_timeout: None,
            },
            ..FileConfig::default()
        };
        let env = EnvConfig {
            server_port: Some(8000),
            ..EnvConfig::default()
        };

        let mut warnings = ConfigWarnings::default();
        let config = compose_config(file, env, &mut warnings).unwrap();

        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.heartbeat.interval, Duration::from_secs(20));
        assert_eq!(config.heartbeat.probe_timeout, Duration::from_secs(3));
        // Advertised port follows the listener when not set.
        assert_eq!(config.registration.port, 8000);
        assert!(warnings.mentions("No Redis configured"));
    }

    #[test]
    fn bad_duration_names_the_field() {
        let env = EnvConfig {
            registration_startup_delay: Some("soon".to_string()),
            ..EnvConfig::default()
        };
        let err = compose_config(
            FileConfig::default(),
            env,
            &mut ConfigWarnings::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigLoadError::InvalidDuration {
                field: "registration.startup_delay",
                ..
            }
        ));
    }

    #[test]
    fn missing_control_plane_falls_back_with_warning() {
        let config = Config::default();
        let mut warnings = ConfigWarnings::default();
        assert_eq!(
            config.control_plane_url_or_default(&mut warnings),
            "http://localhost:5000"
        );
        assert!(warnings.mentions("No control-plane url"));
    }
}
