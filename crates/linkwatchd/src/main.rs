//! linkwatchd — the linkwatch daemon.
//!
//! Keeps a set of commands running only while the network is
//! reachable:
//! - Loads `linkwatch.toml`
//! - Probes the configured addresses and endpoints on a fixed period
//! - Spawns each `[[component]]` command on a healthy cycle
//! - Kills them on an unhealthy cycle
//!
//! # Usage
//!
//! ```text
//! linkwatchd run --config /etc/linkwatch/linkwatch.toml
//! linkwatchd check --config /etc/linkwatch/linkwatch.toml --json
//! ```

mod config;
mod process;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use linkwatch_health::{Component, NetworkHealthCheck};

use crate::config::LinkwatchConfig;
use crate::process::ProcessComponent;
use crate::report::CheckReport;

#[derive(Parser)]
#[command(name = "linkwatchd", about = "Network reachability watchdog")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the network and drive the configured components until interrupted.
    Run {
        /// Path to linkwatch.toml.
        #[arg(long, short, default_value = "/etc/linkwatch/linkwatch.toml")]
        config: PathBuf,
    },
    /// Probe every configured target once and report.
    Check {
        /// Path to linkwatch.toml.
        #[arg(long, short, default_value = "/etc/linkwatch/linkwatch.toml")]
        config: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,linkwatchd=debug,linkwatch_health=debug"));
    if cli.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Run { config } => {
            run_watchdog(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { config, json } => {
            let report = check_once(&config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            Ok(if report.healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn run_watchdog(path: &Path) -> anyhow::Result<()> {
    let config = LinkwatchConfig::from_file(path)?;
    info!(path = %path.display(), "linkwatchd starting");

    let watchdog = Arc::new(NetworkHealthCheck::new(config.watchdog_config()?)?);

    // ── Components ─────────────────────────────────────────────

    let mut components = Vec::new();
    for spec in &config.components {
        let component = Arc::new(ProcessComponent::new(spec.clone()));
        watchdog.add_component(component.clone()).await;
        components.push(component);
    }
    info!(count = components.len(), "components registered");

    // ── Targets ────────────────────────────────────────────────

    watchdog
        .add_address_list(&config.watchdog.addresses.joined())
        .await?;
    watchdog
        .add_endpoint_list(&config.watchdog.endpoints.joined())
        .await?;
    if watchdog.addresses().await.is_empty() && watchdog.endpoints().await.is_empty() {
        warn!("no addresses or endpoints configured, components will not be managed");
    }

    // ── Periodic check ─────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = watchdog.spawn(shutdown_rx);

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = handle.await;

    for component in &components {
        if component.is_started() {
            if let Err(e) = component.stop() {
                warn!(component = %component.name(), error = %e, "failed to stop component on shutdown");
            }
        }
    }

    info!("linkwatchd stopped");
    Ok(())
}

async fn check_once(path: &Path) -> anyhow::Result<CheckReport> {
    let config = LinkwatchConfig::from_file(path)?;
    let watchdog = NetworkHealthCheck::new(config.watchdog_config()?)?;

    let addresses =
        linkwatch_health::targets::resolve_address_list(&config.watchdog.addresses.joined()).await?;
    let endpoints =
        linkwatch_health::targets::parse_endpoint_list(&config.watchdog.endpoints.joined())?;

    let mut report = CheckReport::default();
    for address in addresses {
        let reachable = watchdog.check_address(address).await;
        report.record_address(address, reachable);
    }
    for endpoint in endpoints {
        let reachable = watchdog.check_endpoint(&endpoint).await;
        report.record_endpoint(&endpoint, reachable);
    }
    Ok(report)
}
