use std::{fs, time::Duration};

use logfleet_config::{ConfigLoadError, ConfigLoader};
use once_cell::sync::Lazy;
use tempfile::tempdir;

static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> =
    Lazy::new(|| tokio::sync::Mutex::new(()));

const MANAGED_VARS: &[&str] = &[
    "LOGFLEET_CONFIG",
    "SERVER_HOST",
    "SERVER_PORT",
    "REDIS_URL",
    "HEARTBEAT_INTERVAL",
    "CONTROL_PLANE_URL",
    "SERVICE_NAME",
    "AUTO_REGISTER",
];

fn clear_env() {
    for key in MANAGED_VARS {
        unsafe { std::env::remove_var(key) };
    }
}

#[tokio::test]
async fn file_values_are_loaded_and_env_overrides_them() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("logfleet.toml");
    fs::write(
        &path,
        r#"
[server]
port = 6001

[redis]
url = "redis://cache:6379"

[heartbeat]
interval = "15s"
probe_timeout = "2s"

[registration]
control_plane_url = "lb.internal:5000"
name = "worker-east"
auto_register = false
"#,
    )
    .expect("write config");

    unsafe { std::env::set_var("SERVICE_NAME", "worker-west") };
    let load = ConfigLoader::new()
        .with_config_path(&path)
        .with_env_file(dir.path().join("absent.env"))
        .load()
        .expect("load config");
    clear_env();

    let config = load.config;
    assert_eq!(config.server.port, 6001);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(
        config.redis.map(|r| r.url),
        Some("redis://cache:6379".to_string())
    );
    assert_eq!(config.heartbeat.interval, Duration::from_secs(15));
    assert_eq!(config.heartbeat.probe_timeout, Duration::from_secs(2));
    assert_eq!(config.registration.name, "worker-west");
    assert!(!config.registration.auto_register);
    assert_eq!(config.metadata.config_path, Some(path));
    assert!(!config.metadata.env_file_loaded);
    assert!(load.warnings.is_empty());
}

#[tokio::test]
async fn explicit_missing_file_is_an_error() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();

    let dir = tempdir().expect("tempdir");
    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("nope.toml"))
        .with_env_file(dir.path().join("absent.env"))
        .load()
        .unwrap_err();

    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[tokio::test]
async fn malformed_file_is_a_parse_error() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("logfleet.toml");
    fs::write(&path, "[server\nport = ").expect("write config");

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .with_env_file(dir.path().join("absent.env"))
        .load()
        .unwrap_err();

    assert!(matches!(err, ConfigLoadError::Parse { .. }));
}

#[tokio::test]
async fn env_file_values_are_applied() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();

    let dir = tempdir().expect("tempdir");
    let env_path = dir.path().join(".env");
    fs::write(&env_path, "SERVER_PORT=7123\nCONTROL_PLANE_URL=http://cp:5000\n")
        .expect("write env");
    let cfg_path = dir.path().join("logfleet.toml");
    fs::write(&cfg_path, "").expect("write config");

    let load = ConfigLoader::new()
        .with_config_path(&cfg_path)
        .with_env_file(&env_path)
        .load()
        .expect("load config");
    clear_env();

    assert!(load.config.metadata.env_file_loaded);
    assert_eq!(load.config.server.port, 7123);
    assert_eq!(
        load.config.registration.control_plane_url.as_deref(),
        Some("http://cp:5000")
    );
    assert!(load.warnings.mentions("No Redis configured"));
}
