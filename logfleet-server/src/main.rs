//! `logfleet` binary: runs either the control plane or a worker.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logfleet_config::{Config, ConfigLoad, ConfigLoader};
use logfleet_server::app;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "logfleet")]
#[command(about = "Control plane and workers for a replicated log-ingesting fleet")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a logfleet.toml (overrides LOGFLEET_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the registry, dispatcher and replication hub
    ControlPlane(ServeArgs),
    /// Run a log-ingesting worker
    Worker(WorkerArgs),
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct WorkerArgs {
    #[command(flatten)]
    serve: ServeArgs,

    /// Control plane to register and replicate with
    #[arg(long, env = "CONTROL_PLANE_URL")]
    control_plane: Option<String>,

    /// Name advertised to the control plane
    #[arg(long, env = "SERVICE_NAME")]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config.clone() {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path.as_ref() {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in &warnings.items {
        warn!("{warning}");
    }

    match cli.command {
        Command::ControlPlane(args) => {
            apply_serve_args(&mut config, &args);
            app::run_control_plane(Arc::new(config)).await
        }
        Command::Worker(args) => {
            apply_worker_args(&mut config, &args);
            app::run_worker(Arc::new(config)).await
        }
    }
}

fn apply_serve_args(config: &mut Config, args: &ServeArgs) {
    if let Some(port) = args.port {
        // The advertised port follows the listener unless set on its own.
        if config.registration.port == config.server.port {
            config.registration.port = port;
        }
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }
}

fn apply_worker_args(config: &mut Config, args: &WorkerArgs) {
    apply_serve_args(config, &args.serve);
    if let Some(url) = args.control_plane.clone() {
        config.registration.control_plane_url = Some(url);
    }
    if let Some(name) = args.name.clone() {
        config.registration.name = name;
    }
}
