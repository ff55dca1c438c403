//! Command-line interface

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use monitor::{MonitorConfig, StopReason};
use tracing::info;

use crate::{bootstrap, run_server, ui, AppState};

/// Driver drowsiness monitor
#[derive(Debug, Parser)]
#[command(name = "drowsy-monitor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file (environment `DROWSY__*` overrides it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Monitor a driving session in the terminal
    Monitor(MonitorArgs),
    /// Serve the session dashboard API
    Serve(ServeArgs),
    /// Delete every stored session of a user
    DeleteSessions(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Signed-in driver
    #[arg(short, long)]
    pub username: String,

    /// Live camera index or path (overrides camera.device)
    #[arg(long, conflicts_with = "frames")]
    pub device: Option<String>,

    /// Directory of recorded frames (overrides camera.source_dir)
    #[arg(long)]
    pub frames: Option<PathBuf>,

    /// ONNX detector (overrides classifier.model_path)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Expose loop counters for Prometheus at `http://<addr>/metrics`
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub addr: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Whose sessions to delete
    #[arg(short, long)]
    pub username: String,

    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

/// Execute the parsed command
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = MonitorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Monitor(args) => {
            if let Some(device) = args.device {
                config.camera.device = Some(device);
            }
            if let Some(frames) = args.frames {
                config.camera.source_dir = frames;
                config.camera.device = None;
            }
            if let Some(model) = args.model {
                config.classifier.model_path = Some(model);
            }

            if let Some(addr) = args.metrics_addr {
                PrometheusBuilder::new()
                    .with_http_listener(addr)
                    .install()
                    .context("installing metrics exporter")?;
                info!("Serving monitoring metrics on http://{}/metrics", addr);
            }

            let monitoring = bootstrap::build_monitor(&config, &args.username).await?;
            let outcome = ui::run_terminal(monitoring.spawn()).await?;
            info!("Monitoring ended: {:?}", outcome.stop_reason);

            if outcome.stop_reason == StopReason::CaptureFailed {
                println!("Camera stopped delivering frames.");
            }
            Ok(())
        }
        Commands::Serve(args) => {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .context("installing metrics exporter")?;
            let store = bootstrap::open_store(&config).await?;
            run_server(&args.addr, AppState::new(store).with_metrics(handle)).await
        }
        Commands::DeleteSessions(args) => {
            let username = args.username.trim();
            if username.is_empty() {
                bail!("username must not be empty");
            }
            if !args.yes {
                bail!("refusing to delete sessions of '{username}' without --yes");
            }

            let store = bootstrap::open_store(&config).await?;
            let removed = store.delete_user_sessions(username).await?;
            println!("Deleted {removed} sessions for {username}");
            Ok(())
        }
    }
}
