mod ui;

use std::{
    env,
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing::{info, warn};
use warroom_gateway::{ExternalStatsGateway, ProxyStatsClient, StatsGateway};
use warroom_poller::LiveSnapshotPoller;
use warroom_server::StatsServer;
use warroom_types::{config::WarRoomConfig, dashboard::DashboardData, dashboard::TrendRange};

use crate::ui::UiMessage;

const DEFAULT_CONFIG: &str = "configs/dev.toml";
const CONFIG_ENV: &str = "WARROOM_CONFIG";
const DASHBOARD_LOG_FILE: &str = "warroom.log";

#[derive(Debug, Parser)]
#[command(name = "warroom", version, about = "Streaming channel war room")]
struct Cli {
    /// Config file. Falls back to $WARROOM_CONFIG, then configs/dev.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the stats proxy and dashboard data endpoints.
    Serve,
    /// Open the terminal dashboard with live polling.
    Dashboard {
        /// Call the platform directly instead of going through the proxy.
        #[arg(long)]
        direct: bool,
        #[arg(long, default_value = "30d")]
        range: TrendRange,
        /// Override the poll interval from the config file.
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Fetch one snapshot and print it as JSON.
    Snapshot {
        #[arg(long)]
        direct: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());
    config.gateway.apply_env();
    if matches!(cli.command, Command::Dashboard { .. }) && config.ops.log_file.is_none() {
        config.ops.log_file = Some(DASHBOARD_LOG_FILE.into());
    }
    warroom_ops::init_tracing(&config.ops)?;

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Dashboard {
            direct,
            range,
            interval_ms,
        } => dashboard(&config, direct, range, interval_ms).await,
        Command::Snapshot { direct } => snapshot(&config, direct).await,
    }
}

async fn serve(config: &WarRoomConfig) -> Result<()> {
    let server = StatsServer::from_config(config)?;
    info!("Starting war room server for {} on {}", config.gateway.channel, server.addr());
    server.serve().await?;
    Ok(())
}

fn build_gateway(config: &WarRoomConfig, direct: bool) -> Result<Box<dyn StatsGateway>> {
    if direct {
        let missing = config.gateway.missing_credentials();
        if !missing.is_empty() {
            warn!("Platform credentials {:?} are not set", missing);
        }
        let gateway = ExternalStatsGateway::from_config(&config.gateway)
            .context("failed to build platform gateway")?;
        Ok(Box::new(gateway))
    } else {
        let client = ProxyStatsClient::new(
            config.poller.proxy_url.clone(),
            Duration::from_millis(config.gateway.timeout_ms),
        )
        .context("failed to build proxy client")?;
        Ok(Box::new(client))
    }
}

async fn snapshot(config: &WarRoomConfig, direct: bool) -> Result<()> {
    let gateway = build_gateway(config, direct)?;
    let snapshot = gateway
        .fetch_snapshot()
        .await
        .with_context(|| format!("failed to fetch snapshot for '{}'", config.gateway.channel))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn dashboard(
    config: &WarRoomConfig,
    direct: bool,
    range: TrendRange,
    interval_ms: Option<u64>,
) -> Result<()> {
    let gateway = build_gateway(config, direct)?;
    let poller = Arc::new(LiveSnapshotPoller::new(gateway, &config.poller));
    let every = interval_ms
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| poller.default_interval());

    let (tx, rx) = mpsc::channel();
    let mut events = poller.events();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if tx.send(UiMessage::Event(event)).is_err() {
                break;
            }
        }
    });

    poller.start(every);
    let ui_poller = Arc::clone(&poller);
    let runtime = tokio::runtime::Handle::current();
    let data = DashboardData::default();
    let outcome =
        tokio::task::spawn_blocking(move || ui::run(rx, ui_poller, runtime, data, range)).await;

    poller.stop();
    forwarder.abort();
    outcome.context("dashboard thread panicked")?
}

fn load_config(explicit: Option<&Path>) -> WarRoomConfig {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    match WarRoomConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                WarRoomConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            WarRoomConfig::default()
        }
    }
}
